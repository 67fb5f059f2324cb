//! Event subscription bus.
//!
//! Physical-world signals (objects observed, docking sub-states, animation
//! lifecycle, lift movement) and action completions are published on an
//! [`EventBus`]. Subscribers receive a [`Subscription`] handle backed by an
//! unbounded channel; dropping the handle unsubscribes.
//!
//! Handlers never run inside `publish`. Events queue up in the handle and
//! the subscriber drains them on its own tick, so no state machine is ever
//! re-entered from a publisher.

use chrono::{DateTime, Utc};
use maneuver_types::{
    ActionCompletion, AnimationTrigger, DockManeuver, DockingStatus, MarkerCode, ObjectId,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// One perception report for an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectObservation {
    /// Object seen.
    pub object: ObjectId,
    /// Marker codes visible in this observation.
    pub markers: Vec<MarkerCode>,
    /// When the observation was made.
    pub observed_at: DateTime<Utc>,
}

impl ObjectObservation {
    /// Whether at least one marker was visible.
    pub fn markers_visible(&self) -> bool {
        !self.markers.is_empty()
    }
}

/// An event published on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotEvent {
    /// Perception reported an object.
    ObjectObserved(ObjectObservation),
    /// The firmware reported a docking sub-state.
    DockingStatus(DockingStatus),
    /// An animation started playing.
    AnimationStarted(AnimationTrigger),
    /// An animation finished.
    AnimationEnded(AnimationTrigger),
    /// An animation was interrupted.
    AnimationAborted(AnimationTrigger),
    /// The lift started moving after docking finished.
    LiftMovingPostDock {
        /// Maneuver that was executed.
        maneuver: DockManeuver,
    },
    /// An action reached a terminal result.
    ActionCompleted(ActionCompletion),
}

impl RobotEvent {
    /// Kind used to route this event to subscribers.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ObjectObserved(_) => EventKind::ObjectObserved,
            Self::DockingStatus(_) => EventKind::DockingStatus,
            Self::AnimationStarted(_) => EventKind::AnimationStarted,
            Self::AnimationEnded(_) => EventKind::AnimationEnded,
            Self::AnimationAborted(_) => EventKind::AnimationAborted,
            Self::LiftMovingPostDock { .. } => EventKind::LiftMovingPostDock,
            Self::ActionCompleted(_) => EventKind::ActionCompleted,
        }
    }
}

/// Discriminant of [`RobotEvent`] used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`RobotEvent::ObjectObserved`].
    ObjectObserved,
    /// [`RobotEvent::DockingStatus`].
    DockingStatus,
    /// [`RobotEvent::AnimationStarted`].
    AnimationStarted,
    /// [`RobotEvent::AnimationEnded`].
    AnimationEnded,
    /// [`RobotEvent::AnimationAborted`].
    AnimationAborted,
    /// [`RobotEvent::LiftMovingPostDock`].
    LiftMovingPostDock,
    /// [`RobotEvent::ActionCompleted`].
    ActionCompleted,
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    receiver: UnboundedReceiver<RobotEvent>,
}

impl Subscription {
    /// Kind this handle is subscribed to.
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Take the next pending event, if any.
    pub fn try_next(&mut self) -> Option<RobotEvent> {
        self.receiver.try_recv().ok()
    }

    /// Take every pending event in arrival order.
    pub fn drain(&mut self) -> Vec<RobotEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

/// Fan-out bus of [`RobotEvent`]s.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<(EventKind, UnboundedSender<RobotEvent>)>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub fn subscribe(&mut self, kind: EventKind) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push((kind, sender));
        Subscription { kind, receiver }
    }

    /// Deliver an event to every live subscriber of its kind.
    ///
    /// Subscribers whose handle has been dropped are pruned.
    pub fn publish(&mut self, event: &RobotEvent) {
        let kind = event.kind();
        self.subscribers.retain(|(subscribed, sender)| {
            if *subscribed == kind {
                sender.send(event.clone()).is_ok()
            } else {
                !sender.is_closed()
            }
        });
        trace!(?kind, subscribers = self.subscribers.len(), "Event published");
    }

    /// Number of live subscribers for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .iter()
            .filter(|(subscribed, sender)| *subscribed == kind && !sender.is_closed())
            .count()
    }
}
