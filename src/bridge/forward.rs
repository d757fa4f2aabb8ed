//! Forwarding loops: one per CEC event channel, each publishing to MQTT.
//!
//! A loop waits for either its next event or cancellation. Cancellation wins
//! when both are ready, so events still buffered at shutdown are dropped.
//! A publish is awaited before the next receive, which lets a slow broker
//! throttle consumption of that channel. The publish itself also yields to
//! cancellation, so a stalled broker cannot hold up shutdown.

use super::Bridge;
use crate::cec::{CecConnection, Command, KeyPress, SourceActivation, UserControlCode};
use crate::message::{self, Direction};
use crate::mqtt::MqttTransport;
use crate::topic::{self, SourceAttribute};
use log::{debug, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Next event from `rx`, or `None` once cancelled or the channel is closed.
async fn next_event<T>(
    rx: &mut mpsc::Receiver<T>,
    cancel: &CancellationToken,
    name: &str,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("[Bridge] {} forwarding cancelled", name);
            None
        }
        event = rx.recv() => {
            if event.is_none() {
                info!("[Bridge] {} channel closed", name);
            }
            event
        }
    }
}

impl<C: CecConnection, M: MqttTransport> Bridge<C, M> {
    /// Publish unless `cancel` fires first. Returns false once cancelled.
    async fn publish_until_cancelled(
        &self,
        cancel: &CancellationToken,
        subtopic: &str,
        payload: &str,
        retain: bool,
    ) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("[Bridge] Publish to {} abandoned on shutdown", subtopic);
                false
            }
            _ = self.publish_logged(subtopic, payload, retain) => true,
        }
    }

    /// Publish every observed command to `cec/command/rx`.
    pub async fn forward_commands(
        &self,
        mut commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) {
        while let Some(command) = next_event(&mut commands, &cancel, "Command").await {
            debug!("[Bridge] Command: {}", command.command_string);
            if !self
                .publish_until_cancelled(&cancel, topic::COMMAND_RX, &command.command_string, false)
                .await
            {
                break;
            }
        }
    }

    /// Publish released keys to `cec/key`. Repeats of a held key are dropped.
    pub async fn forward_key_presses(
        &self,
        mut key_presses: mpsc::Receiver<KeyPress>,
        cancel: CancellationToken,
    ) {
        while let Some(key_press) = next_event(&mut key_presses, &cancel, "Key press").await {
            debug!(
                "[Bridge] Key press: code {} ({:?}), duration {}",
                key_press.key_code,
                UserControlCode::from_repr(key_press.key_code),
                key_press.duration
            );
            if key_press.duration == 0
                && !self
                    .publish_until_cancelled(
                        &cancel,
                        topic::KEY,
                        &key_press.key_code.to_string(),
                        false,
                    )
                    .await
            {
                break;
            }
        }
    }

    /// Publish source activation changes as retained `active` state.
    pub async fn forward_source_activations(
        &self,
        mut activations: mpsc::Receiver<SourceActivation>,
        cancel: CancellationToken,
    ) {
        while let Some(activation) =
            next_event(&mut activations, &cancel, "Source activation").await
        {
            debug!(
                "[Bridge] Source activation: logical address {}, state {}",
                activation.logical_address, activation.state
            );
            if !self
                .publish_until_cancelled(
                    &cancel,
                    &topic::source(activation.logical_address, SourceAttribute::Active),
                    &activation.state.to_string(),
                    true,
                )
                .await
            {
                break;
            }
        }
    }

    /// Republish raw trace lines to `cec/message` (unless `log_only`) and the
    /// hex octets of traffic lines, retained, to `cec/message/hex/{rx,tx}`.
    pub async fn forward_messages(
        &self,
        mut messages: mpsc::Receiver<String>,
        log_only: bool,
        cancel: CancellationToken,
    ) {
        while let Some(message) = next_event(&mut messages, &cancel, "Message").await {
            debug!("[Bridge] Message: {}", message);
            if !log_only
                && !self
                    .publish_until_cancelled(&cancel, topic::MESSAGE, &message, false)
                    .await
            {
                break;
            }

            let Some(traffic) = message::classify(&message) else {
                continue;
            };
            debug!(
                "[Bridge] Traffic {:?}: {}",
                traffic.direction, traffic.hex
            );
            let subtopic = match traffic.direction {
                Direction::Inbound => topic::MESSAGE_HEX_RX,
                Direction::Outbound => topic::MESSAGE_HEX_TX,
            };
            if !self
                .publish_until_cancelled(&cancel, subtopic, traffic.hex, true)
                .await
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{Journal, MockCec, MockMqtt};
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    async fn bridge() -> (Bridge<MockCec, MockMqtt>, Journal) {
        let (cec, mqtt, journal) = MockCec::with_mqtt(HashMap::new());
        let bridge = Bridge::new(cec, mqtt, "").await.unwrap();
        journal.clear();
        (bridge, journal)
    }

    #[tokio::test]
    async fn test_commands_are_forwarded_in_order() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        for command in ["TV -> Broadcast: STANDBY", "TV -> Audio: GIVE_AUDIO_STATUS"] {
            tx.send(Command {
                command_string: command.to_string(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        bridge.forward_commands(rx, CancellationToken::new()).await;

        assert_eq!(
            journal.publishes(),
            vec![
                (
                    "cec/command/rx".to_string(),
                    "TV -> Broadcast: STANDBY".to_string(),
                    false
                ),
                (
                    "cec/command/rx".to_string(),
                    "TV -> Audio: GIVE_AUDIO_STATUS".to_string(),
                    false
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_only_released_keys_are_published() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        for duration in [5, 250, 0] {
            tx.send(KeyPress {
                key_code: 65,
                duration,
            })
            .await
            .unwrap();
        }
        drop(tx);
        bridge.forward_key_presses(rx, CancellationToken::new()).await;

        assert_eq!(
            journal.publishes(),
            vec![("cec/key".to_string(), "65".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_held_key_produces_no_publish() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        tx.send(KeyPress {
            key_code: 1,
            duration: 5,
        })
        .await
        .unwrap();
        drop(tx);
        bridge.forward_key_presses(rx, CancellationToken::new()).await;

        assert!(journal.publishes().is_empty());
    }

    #[tokio::test]
    async fn test_source_activations_are_retained() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        tx.send(SourceActivation {
            logical_address: 4,
            state: true,
        })
        .await
        .unwrap();
        tx.send(SourceActivation {
            logical_address: 4,
            state: false,
        })
        .await
        .unwrap();
        drop(tx);
        bridge
            .forward_source_activations(rx, CancellationToken::new())
            .await;

        assert_eq!(
            journal.publishes(),
            vec![
                ("cec/source/4/active".to_string(), "true".to_string(), true),
                ("cec/source/4/active".to_string(), "false".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_messages_are_republished_and_classified() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        for line in [">> 10:8F", "<< 04", "hello world"] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);
        bridge
            .forward_messages(rx, false, CancellationToken::new())
            .await;

        assert_eq!(
            journal.publishes(),
            vec![
                ("cec/message".to_string(), ">> 10:8F".to_string(), false),
                ("cec/message/hex/tx".to_string(), "10:8F".to_string(), true),
                ("cec/message".to_string(), "<< 04".to_string(), false),
                ("cec/message/hex/rx".to_string(), "04".to_string(), true),
                ("cec/message".to_string(), "hello world".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_log_only_still_classifies() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);

        for line in ["<< 01:44:41", ">>10:8F", "waiting for input"] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);
        bridge.forward_messages(rx, true, CancellationToken::new()).await;

        assert_eq!(
            journal.publishes(),
            vec![(
                "cec/message/hex/rx".to_string(),
                "01:44:41".to_string(),
                true
            )]
        );
    }

    #[tokio::test]
    async fn test_cancelled_loop_drops_buffered_events() {
        let (bridge, journal) = bridge().await;
        let (tx, rx) = mpsc::channel(10);
        tx.send(Command {
            command_string: "TV -> Broadcast: STANDBY".to_string(),
        })
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        bridge.forward_commands(rx, cancel).await;

        assert!(journal.publishes().is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting_loop() {
        let (bridge, journal) = bridge().await;
        let bridge = std::sync::Arc::new(bridge);
        let (tx, rx) = mpsc::channel::<String>(10);
        let cancel = CancellationToken::new();

        let task = {
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bridge.forward_messages(rx, false, cancel).await })
        };
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("loop did not stop")
            .unwrap();

        assert!(journal.publishes().is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_stalled_publish() {
        let (cec, _, journal) = MockCec::with_mqtt(HashMap::new());
        let mqtt = MockMqtt::stalled(journal.clone());
        let bridge = Arc::new(Bridge::new(cec, mqtt, "").await.unwrap());

        let (tx, rx) = mpsc::channel(10);
        for command in ["TV -> Broadcast: STANDBY", "TV -> Broadcast: STANDBY"] {
            tx.send(Command {
                command_string: command.to_string(),
            })
            .await
            .unwrap();
        }

        let cancel = CancellationToken::new();
        let task = {
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bridge.forward_commands(rx, cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(journal.publishes().len(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop stayed blocked in publish")
            .unwrap();

        // The second buffered command is never published.
        assert_eq!(journal.publishes().len(), 1);
        drop(tx);
    }
}
