//! Traspaso state machine.

use serde::{Deserialize, Serialize};

/// The state of a traspaso in its lifecycle.
///
/// State transitions:
/// ```text
/// Pendiente ──► Aprobado ──► EnTransito ──► Recibido
///     │             │             │
///     └─────────────┴─────────────┴──► Rechazado
/// ```
///
/// Approval passes through `Aprobado` and lands in `EnTransito` within the same
/// commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraspasoState {
    /// Requested, stock not yet touched.
    #[default]
    Pendiente,

    /// Approved; origin stock debited.
    Aprobado,

    /// Stock left the origin and awaits receipt.
    EnTransito,

    /// Received at the destination (terminal state).
    Recibido,

    /// Rejected; any debited stock was returned (terminal state).
    Rechazado,
}

impl TraspasoState {
    pub fn can_approve(&self) -> bool {
        matches!(self, TraspasoState::Pendiente)
    }

    pub fn can_dispatch(&self) -> bool {
        matches!(self, TraspasoState::Aprobado)
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, TraspasoState::EnTransito)
    }

    pub fn can_reject(&self) -> bool {
        matches!(
            self,
            TraspasoState::Pendiente | TraspasoState::Aprobado | TraspasoState::EnTransito
        )
    }

    /// Whether origin stock has left its lot and not come back.
    pub fn holds_stock(&self) -> bool {
        matches!(self, TraspasoState::Aprobado | TraspasoState::EnTransito)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TraspasoState::Recibido | TraspasoState::Rechazado)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TraspasoState::Pendiente => "PENDIENTE",
            TraspasoState::Aprobado => "APROBADO",
            TraspasoState::EnTransito => "EN_TRANSITO",
            TraspasoState::Recibido => "RECIBIDO",
            TraspasoState::Rechazado => "RECHAZADO",
        }
    }
}

impl std::fmt::Display for TraspasoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TraspasoState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDIENTE" => Ok(TraspasoState::Pendiente),
            "APROBADO" => Ok(TraspasoState::Aprobado),
            "EN_TRANSITO" => Ok(TraspasoState::EnTransito),
            "RECIBIDO" => Ok(TraspasoState::Recibido),
            "RECHAZADO" => Ok(TraspasoState::Rechazado),
            other => Err(format!("unknown traspaso state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pendiente() {
        assert_eq!(TraspasoState::default(), TraspasoState::Pendiente);
    }

    #[test]
    fn transitions() {
        assert!(TraspasoState::Pendiente.can_approve());
        assert!(!TraspasoState::Pendiente.can_receive());
        assert!(TraspasoState::EnTransito.can_receive());
        assert!(TraspasoState::EnTransito.can_reject());
        assert!(!TraspasoState::Recibido.can_reject());
        assert!(!TraspasoState::Rechazado.can_approve());
    }

    #[test]
    fn terminal_states() {
        assert!(TraspasoState::Recibido.is_terminal());
        assert!(TraspasoState::Rechazado.is_terminal());
        assert!(!TraspasoState::EnTransito.is_terminal());
    }

    #[test]
    fn parses_wire_names() {
        for state in [
            TraspasoState::Pendiente,
            TraspasoState::Aprobado,
            TraspasoState::EnTransito,
            TraspasoState::Recibido,
            TraspasoState::Rechazado,
        ] {
            assert_eq!(state.as_str().parse::<TraspasoState>(), Ok(state));
        }
        assert_eq!("en_transito".parse::<TraspasoState>(), Ok(TraspasoState::EnTransito));
        assert!("ENVIADO".parse::<TraspasoState>().is_err());
    }
}
