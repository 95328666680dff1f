//! Inbound event model, event bus, and outbound side effects.
//!
//! The platform adapter (Discord gateway, test harness, replay tool) turns
//! raw gateway traffic into [`InboundEvent`]s and publishes them on an
//! [`EventBus`]. Anything interested in events subscribes and keeps the
//! returned [`Subscription`]; dropping it unsubscribes.

pub mod bus;
pub mod error;
pub mod event;
pub mod outbound;

pub use {
    bus::{EventBus, EventHandler, Subscription},
    error::{Error, Result},
    event::{ChannelInfo, GuildInfo, GuildMember, InboundEvent, InboundMessage, Reaction},
    outbound::{ChannelOutbound, OutboundAction, RecordingOutbound},
};
