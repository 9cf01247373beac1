//! Compilation seam: one device view in, one artifact out.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::identity::DeviceIdentity;
use crate::index::DeviceView;

/// Rendered configuration of one device in both output schemas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledArtifact {
    /// OpenConfig document.
    pub openconfig: Value,
    /// IETF document.
    pub ietf: Value,
    /// Device is managed by the on-box agent.
    pub afk_enabled: bool,
}

/// Errors raised while compiling one device.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A session attached to the device does not involve it.
    #[error("BGP session does not involve the device")]
    ForeignSession {
        /// Device being compiled.
        device: DeviceIdentity,
        /// Devices terminating the session.
        peers: (String, String),
    },
    /// A record references a name the device does not define.
    #[error("reference to an undefined object")]
    UndefinedReference {
        /// Device being compiled.
        device: DeviceIdentity,
        /// Kind of the missing object (`peer-group`, `route-policy`, ...).
        kind: &'static str,
        /// Missing name.
        name: String,
    },
    /// A route policy term is inconsistent.
    #[error("invalid route policy term")]
    InvalidTerm {
        /// Device being compiled.
        device: DeviceIdentity,
        /// Policy name.
        policy: String,
        /// Term sequence number.
        sequence: u32,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// The compiler rejected the device for another reason.
    #[error("device compilation failed")]
    Rejected {
        /// Device being compiled.
        device: DeviceIdentity,
        /// Human-readable reason.
        reason: String,
    },
}

impl CompileError {
    /// Device whose compilation failed.
    #[must_use]
    pub const fn device(&self) -> &DeviceIdentity {
        match self {
            Self::ForeignSession { device, .. }
            | Self::UndefinedReference { device, .. }
            | Self::InvalidTerm { device, .. }
            | Self::Rejected { device, .. } => device,
        }
    }

    /// Short description suitable for report messages.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::ForeignSession { peers, .. } => {
                format!("session {} <-> {} does not involve the device", peers.0, peers.1)
            }
            Self::UndefinedReference { kind, name, .. } => format!("undefined {kind} {name}"),
            Self::InvalidTerm {
                policy,
                sequence,
                reason,
                ..
            } => format!("route-policy {policy} term {sequence}: {reason}"),
            Self::Rejected { reason, .. } => reason.clone(),
        }
    }
}

/// Renders a [`DeviceView`] into a [`CompiledArtifact`].
///
/// Implementations must be pure functions of their input: compilations of
/// different devices run concurrently and share nothing mutable.
pub trait DeviceCompiler: Send + Sync {
    /// Compile one device.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when the view cannot be rendered.
    fn compile(&self, view: &DeviceView) -> Result<CompiledArtifact, CompileError>;
}
