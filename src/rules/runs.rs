use crate::error::RuleError;
use crate::tables::registrations::{RegistrationId, RegistrationRecord, RegistrationStatus};
use crate::tables::users::UserId;

/// Whether the user may sign up for runs of the convention event the run belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConventionGate {
    NotRequired,
    Confirmed,
    NotConfirmed,
}

pub fn effective_max_players(max_players: Option<i64>, game_players_max: i64) -> i64 {
    max_players.unwrap_or(game_players_max).max(0)
}

/// Snapshot of one run taken inside the registration transaction.
pub struct RunState<'a> {
    pub registration_open: bool,
    pub max_players: Option<i64>,
    pub game_players_max: i64,
    pub masters: &'a [UserId],
    pub registrations: &'a [RegistrationRecord],
}

impl RunState<'_> {
    pub fn effective_max_players(&self) -> i64 {
        effective_max_players(self.max_players, self.game_players_max)
    }

    /// Non-technician registrations that hold a slot, pending ones included.
    pub fn registered_count(&self) -> i64 {
        self.registrations.iter()
            .filter(|r| !r.is_technician && r.status.reserves_slot())
            .count() as i64
    }

    pub fn available_slots(&self) -> i64 {
        (self.effective_max_players() - self.registered_count()).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.available_slots() == 0
    }

    pub fn registration_of(&self, user_id: UserId) -> Result<&RegistrationRecord, RuleError> {
        self.registrations.iter()
            .find(|r| r.user_id == user_id)
            .ok_or(RuleError::NotRegistered)
    }

    /// Status a new registration gets, or why it is refused.
    pub fn admit(&self, user_id: UserId, is_technician: bool, gate: ConventionGate) -> Result<RegistrationStatus, RuleError> {
        if !self.registration_open {
            return Err(RuleError::RegistrationClosed);
        }
        if self.masters.contains(&user_id) {
            return Err(RuleError::MasterConflict);
        }
        if self.registrations.iter().any(|r| r.user_id == user_id) {
            return Err(RuleError::DuplicateRegistration);
        }
        if gate == ConventionGate::NotConfirmed {
            return Err(RuleError::ConventionGateNotMet);
        }
        if is_technician || !self.is_full() {
            Ok(RegistrationStatus::Pending)
        } else {
            Ok(RegistrationStatus::Waitlist)
        }
    }

    /// Oldest waitlisted player to move up once `removed` is gone.
    /// Only a confirmed player leaving frees a slot worth re-offering.
    pub fn promotion_after_removal(&self, removed: &RegistrationRecord) -> Option<RegistrationId> {
        if removed.is_technician || removed.status != RegistrationStatus::Confirmed {
            return None;
        }
        self.registrations.iter()
            .filter(|r| r.id != removed.id && !r.is_technician && r.status == RegistrationStatus::Waitlist)
            .min_by_key(|r| (r.created_at, r.id))
            .map(|r| r.id)
    }
}
