// ==============================================================================
// session/network.rs - PEER SYNC FOR A NETWORKED MATCH
// ------------------------------------------------------------------------------
// Both peers simulate the whole match. Each tick:
// - the peer's latest held controls drive the remote car,
// - our own held controls are published whenever they change,
// - the authoritative peer publishes a pose bundle every N ticks,
// - the other peer adopts the newest bundle it has not applied yet.
//
// Inbound state is last-value-wins; nothing here ever waits on the relay.
// Outbound failures are logged and the match carries on.
// ==============================================================================

use std::sync::Arc;
use tracing::{debug, warn};

use super::pitch::Pitch;
use crate::config::SyncSettings;
use crate::input::Controls;
use crate::protocol::{ClientMsg, InputPayload, PoseBundle};
use crate::spawn::Player;
use crate::transport::{MatchSubscription, Transport};

/// Counts ticks between outbound pose bundles.
#[derive(Debug, Clone)]
pub struct PoseThrottle {
    ticks_since_send: u32,
    interval: u32,
}

impl PoseThrottle {
    pub fn new(interval: u32) -> Self {
        Self {
            ticks_since_send: 0,
            interval: interval.max(1),
        }
    }

    /// True once every `interval` calls; the counter restarts on true.
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_send += 1;
        if self.ticks_since_send >= self.interval {
            self.ticks_since_send = 0;
            true
        } else {
            false
        }
    }
}

pub struct NetSync {
    transport: Arc<dyn Transport>,
    subscription: Option<MatchSubscription>,
    room: String,
    local: Player,
    authoritative: bool,
    settings: SyncSettings,
    throttle: PoseThrottle,
    last_sent: Option<Controls>,   // what the peer last heard from us
}

impl NetSync {
    pub fn new(
        transport: Arc<dyn Transport>,
        room: String,
        local: Player,
        authoritative: bool,
        settings: SyncSettings,
    ) -> Self {
        let subscription = Some(transport.inbound().subscribe());
        Self {
            transport,
            subscription,
            room,
            local,
            authoritative,
            settings,
            throttle: PoseThrottle::new(settings.pose_interval_ticks),
            last_sent: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Peer's held controls. Input tagged with our own identity is ignored.
    pub fn remote_controls(&self) -> Option<Controls> {
        let input = self.subscription.as_ref()?.latest_input()?;
        (input.player != self.local).then_some(input.controls)
    }

    pub fn publish_input(&mut self, controls: Controls) {
        if self.last_sent == Some(controls) {
            return;
        }
        let payload = match InputPayload::new(self.local, &controls).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "cannot encode input");
                return;
            }
        };
        let msg = ClientMsg::UpdateInput { room_id: self.room.clone(), payload };
        match self.transport.send(msg) {
            Ok(()) => self.last_sent = Some(controls),
            Err(e) => warn!(error = %e, "input not sent"),
        }
    }

    /// Send a pose bundle when this peer is authoritative and one is due.
    pub fn publish_pose(&mut self, pitch: &Pitch) {
        if !self.authoritative || !self.throttle.should_send() {
            return;
        }
        let Some(payload) = pitch.capture() else { return };
        let msg = ClientMsg::UpdatePos { room_id: self.room.clone(), payload };
        if let Err(e) = self.transport.send(msg) {
            warn!(error = %e, "pose bundle not sent");
        }
    }

    /// Apply the newest unseen bundle, if any. Returns it for inspection.
    pub fn adopt_pose(&mut self, pitch: &mut Pitch) -> Option<PoseBundle> {
        let bundle = self.subscription.as_mut()?.take_pose()?;
        pitch.apply(&bundle, self.settings.apply_orientation);
        debug!(p1 = bundle.score.p1, p2 = bundle.score.p2, "adopted pose bundle");
        Some(bundle)
    }

    /// Stop listening and drop whatever the peer left cached; later inbound
    /// traffic is ignored.
    pub fn release(&mut self) {
        self.subscription = None;
        self.transport.inbound().clear_match();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ScorePair, ServerMsg};
    use crate::transport::MemoryTransport;

    fn sync(local: Player, authoritative: bool) -> (NetSync, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let net = NetSync::new(
            transport.clone(),
            "ROOM42".into(),
            local,
            authoritative,
            SyncSettings::default(),
        );
        (net, transport)
    }

    fn remote_input(transport: &MemoryTransport, player: Player, controls: Controls) {
        let payload = InputPayload::new(player, &controls).encode().unwrap();
        transport.inbound().dispatch(ServerMsg::ReceiveInput { payload });
    }

    #[test]
    fn throttle_fires_every_interval() {
        let mut throttle = PoseThrottle::new(10);
        let fired: Vec<usize> = (1..=30).filter(|_| throttle.should_send()).collect();
        assert_eq!(fired, vec![10, 20, 30]);
    }

    #[test]
    fn zero_interval_means_every_tick() {
        let mut throttle = PoseThrottle::new(0);
        assert!(throttle.should_send());
        assert!(throttle.should_send());
    }

    #[test]
    fn own_input_echo_is_ignored() {
        let (net, transport) = sync(Player::P1, true);
        let go = Controls { accelerate: true, ..Default::default() };

        remote_input(&transport, Player::P1, go);
        assert_eq!(net.remote_controls(), None);

        remote_input(&transport, Player::P2, go);
        assert_eq!(net.remote_controls(), Some(go));
    }

    #[test]
    fn input_is_published_only_on_change() {
        let (mut net, transport) = sync(Player::P2, false);
        let idle = Controls::default();
        let left = Controls { left: true, ..Default::default() };

        net.publish_input(idle);
        net.publish_input(idle);
        net.publish_input(left);
        net.publish_input(left);

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 2);
        let ClientMsg::UpdateInput { room_id, payload } = &sent[1] else {
            panic!("expected update-input, got {:?}", sent[1]);
        };
        assert_eq!(room_id, "ROOM42");
        let decoded = InputPayload::decode(payload).unwrap();
        assert_eq!(decoded.player, Player::P2);
        assert!(decoded.controls().left);
    }

    #[test]
    fn failed_send_is_retried_next_tick() {
        let (mut net, transport) = sync(Player::P1, true);
        transport.close();
        net.publish_input(Controls::default());
        assert!(transport.take_sent().is_empty());
        assert_eq!(net.last_sent, None);
    }

    #[test]
    fn released_sync_ignores_inbound() {
        let (mut net, transport) = sync(Player::P2, false);
        net.release();
        assert!(!net.is_subscribed());
        assert_eq!(transport.inbound().subscriber_count(), 0);

        remote_input(&transport, Player::P1, Controls { reverse: true, ..Default::default() });
        transport.inbound().dispatch(ServerMsg::ReceivePos {
            payload: PoseBundle { score: ScorePair { p1: 9, p2: 9 }, ..Default::default() },
        });
        assert_eq!(net.remote_controls(), None);
    }
}
