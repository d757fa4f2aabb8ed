use cec_mqtt_bridge::bridge::Bridge;
use cec_mqtt_bridge::cec::{self, CecClient, CecConnection, EventReceivers};
use cec_mqtt_bridge::config::{self, Config};
use cec_mqtt_bridge::error::Result;
use cec_mqtt_bridge::instance_lock::InstanceLock;
use cec_mqtt_bridge::mqtt::{MqttClient, MqttMessage};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Parser)]
#[command(name = "cec-mqtt-bridge")]
#[command(about = "Expose an HDMI-CEC bus over MQTT")]
struct Cli {
    /// CEC adapter port
    #[arg(long, env = "CEC_NAME")]
    cec_name: Option<String>,

    /// OSD name announced by the adapter
    #[arg(long, env = "CEC_DEVICE_NAME")]
    cec_device_name: Option<String>,

    /// MQTT broker URL, e.g. tcp://localhost:1883
    #[arg(long, env = "MQTT_BROKER")]
    broker: Option<String>,

    /// Prefix for every MQTT topic
    #[arg(long, env = "TOPIC_PREFIX")]
    topic_prefix: Option<String>,

    /// Do not republish raw CEC messages on cec/message
    #[arg(long)]
    log_only: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(port) = &self.cec_name {
            config.cec.port = port.clone();
        }
        if let Some(name) = &self.cec_device_name {
            config.cec.device_name = name.clone();
        }
        if let Some(broker) = &self.broker {
            config.mqtt.set_broker_url(broker)?;
        }
        if let Some(prefix) = &self.topic_prefix {
            config.bridge.topic_prefix = prefix.clone();
        }
        if self.log_only {
            config.bridge.log_only = true;
        }
        Ok(())
    }
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    let cli = Cli::parse();
    init_logger(cli.debug);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting CEC MQTT bridge");

    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;
    info!("Configuration loaded:");
    info!("  CEC adapter: {} ({})", config.cec.port, config.cec.device_name);
    info!("  MQTT broker: {}", config.mqtt.broker_url());
    info!("  Topic prefix: {:?}", config.bridge.topic_prefix);
    info!("  Log only: {}", config.bridge.log_only);

    let _instance_lock = InstanceLock::acquire(&config.cec.port)?;

    let (senders, receivers) = cec::event_channels();
    let cec = CecClient::open(&config.cec, senders).await?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
    let (mqtt, mqtt_loop) = MqttClient::connect(&config.mqtt, msg_tx).await?;

    let bridge = Arc::new(Bridge::new(cec, mqtt, config.bridge.topic_prefix.clone()).await?);

    // Forwarding loops, all stopped by the same token
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let EventReceivers {
        commands,
        key_presses,
        source_activations,
        messages,
    } = receivers;
    {
        let (bridge, cancel) = (bridge.clone(), cancel.clone());
        tracker.spawn(async move { bridge.forward_commands(commands, cancel).await });
    }
    {
        let (bridge, cancel) = (bridge.clone(), cancel.clone());
        tracker.spawn(async move { bridge.forward_key_presses(key_presses, cancel).await });
    }
    {
        let (bridge, cancel) = (bridge.clone(), cancel.clone());
        tracker.spawn(async move {
            bridge
                .forward_source_activations(source_activations, cancel)
                .await
        });
    }
    {
        let (bridge, cancel) = (bridge.clone(), cancel.clone());
        let log_only = config.bridge.log_only;
        tracker.spawn(async move { bridge.forward_messages(messages, log_only, cancel).await });
    }
    tracker.close();

    // Each inbound control message is handled on its own task
    let dispatcher = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let bridge = bridge.clone();
                tokio::spawn(async move {
                    bridge.handle_message(&msg.topic, &msg.payload).await;
                });
            }
        })
    };

    info!("CEC MQTT bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    tracker.wait().await;
    dispatcher.abort();
    mqtt_loop.abort();

    bridge.cec().destroy().await?;
    info!("CEC MQTT bridge stopped");
    Ok(())
}
