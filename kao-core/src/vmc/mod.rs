//! VMC protocol peer (OSC over UDP).
//!
//! Mirrors expression changes to a motion-capture application such as
//! VSeeFace and receives blend-shape telemetry back. The wire format is
//! plain OSC 1.0 messages; only the two blend-shape addresses the relay
//! cares about are interpreted.

mod client;
mod osc;

pub use client::{BlendShapeSample, VmcClient, VmcConfig, VmcError, VmcHandle, VmcStatus};
pub use osc::{
    decode, encode_blend_apply, encode_blend_value, OscArg, OscError, OscMessage,
    BLEND_APPLY_ADDR, BLEND_VALUE_PREFIX,
};

use kao_proto::Expression;

/// Map an avatar expression to its VRM blend-shape preset name.
///
/// VRM models ship the standard presets Joy / Angry / Sorrow / Fun /
/// Neutral; `focused` rides on the furrowed-brow Angry shape and
/// `surprised` on Fun, the usual VTuber rigging convention.
pub const fn blend_shape(expression: Expression) -> &'static str {
    match expression {
        Expression::Happy => "Joy",
        Expression::Surprised => "Fun",
        Expression::Neutral => "Neutral",
        Expression::Focused => "Angry",
        Expression::Sorrow => "Sorrow",
    }
}
