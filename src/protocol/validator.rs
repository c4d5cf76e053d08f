//! Packet Validator
//!
//! Gate between serial intake and the radio. Nothing reaches the air
//! without passing a [`PacketValidator`].

use core::fmt;

use crate::protocol::frame::{Frame, FrameError};

/// Downlink rejected before transmission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing was submitted
    Empty,
    /// Submission is not a well-formed frame
    Frame(FrameError),
    /// Well-formed, but refused by the deployment's acceptance policy
    Rejected,
}

impl From<FrameError> for ValidationError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty submission"),
            Self::Frame(err) => write!(f, "invalid frame: {err}"),
            Self::Rejected => f.write_str("rejected by policy"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ValidationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Empty => defmt::write!(f, "Empty"),
            Self::Frame(err) => defmt::write!(f, "Frame({})", err),
            Self::Rejected => defmt::write!(f, "Rejected"),
        }
    }
}

/// Acceptance check for serial-submitted downlinks
pub trait PacketValidator {
    /// Decide whether `buffer` may be put on the air
    fn validate(&self, buffer: &[u8]) -> Result<(), ValidationError>;
}

impl<V: PacketValidator + ?Sized> PacketValidator for &V {
    fn validate(&self, buffer: &[u8]) -> Result<(), ValidationError> {
        (**self).validate(buffer)
    }
}

/// Structural check only: the submission must decode as a [`Frame`]
///
/// Applies no acceptance policy of its own. Deployments that need one
/// wrap it or supply their own [`PacketValidator`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameValidator;

impl PacketValidator for FrameValidator {
    fn validate(&self, buffer: &[u8]) -> Result<(), ValidationError> {
        if buffer.is_empty() {
            return Err(ValidationError::Empty);
        }
        Frame::decode(buffer)?;
        Ok(())
    }
}

/// Structural check followed by a caller-supplied policy
///
/// The policy sees the decoded frame and returns `false` to refuse it.
#[derive(Clone, Copy, Debug)]
pub struct PolicyValidator<F> {
    policy: F,
}

impl<F> PolicyValidator<F>
where
    F: Fn(&Frame) -> bool,
{
    /// Wrap an acceptance policy
    #[must_use]
    pub const fn new(policy: F) -> Self {
        Self { policy }
    }
}

impl<F> PacketValidator for PolicyValidator<F>
where
    F: Fn(&Frame) -> bool,
{
    fn validate(&self, buffer: &[u8]) -> Result<(), ValidationError> {
        if buffer.is_empty() {
            return Err(ValidationError::Empty);
        }
        let frame = Frame::decode(buffer)?;
        if (self.policy)(&frame) {
            Ok(())
        } else {
            Err(ValidationError::Rejected)
        }
    }
}
