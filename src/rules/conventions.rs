use crate::error::RuleError;
use crate::tables::convention_registrations::{ConventionEventRegistrationRecord, ConventionRegistrationStatus};
use crate::tables::users::UserId;

/// Snapshot of a convention event's own registrations.
pub struct ConventionEventState<'a> {
    pub registration_open: bool,
    /// `None` means unlimited.
    pub capacity: Option<i64>,
    pub registrations: &'a [ConventionEventRegistrationRecord],
}

impl ConventionEventState<'_> {
    /// Unlike runs, only confirmed registrations take a slot here.
    pub fn confirmed_count(&self) -> i64 {
        self.registrations.iter()
            .filter(|r| r.status == ConventionRegistrationStatus::Confirmed)
            .count() as i64
    }

    pub fn available_slots(&self) -> Option<i64> {
        self.capacity.map(|capacity| (capacity - self.confirmed_count()).max(0))
    }

    pub fn is_full(&self) -> bool {
        self.available_slots() == Some(0)
    }

    pub fn registration_of(&self, user_id: UserId) -> Result<&ConventionEventRegistrationRecord, RuleError> {
        self.registrations.iter()
            .find(|r| r.user_id == user_id)
            .ok_or(RuleError::NotRegistered)
    }

    /// New registrations always start pending, an organizer confirms them.
    pub fn admit(&self, user_id: UserId) -> Result<ConventionRegistrationStatus, RuleError> {
        if !self.registration_open {
            return Err(RuleError::RegistrationClosed);
        }
        if self.registrations.iter().any(|r| r.user_id == user_id) {
            return Err(RuleError::DuplicateRegistration);
        }
        if self.is_full() {
            return Err(RuleError::CapacityExceeded);
        }
        Ok(ConventionRegistrationStatus::Pending)
    }

    /// Confirming takes a slot, so it is refused once the event is full.
    pub fn check_status_change(&self, registration: &ConventionEventRegistrationRecord, new_status: ConventionRegistrationStatus) -> Result<(), RuleError> {
        let takes_new_slot = new_status == ConventionRegistrationStatus::Confirmed
            && registration.status != ConventionRegistrationStatus::Confirmed;
        if takes_new_slot && self.is_full() {
            return Err(RuleError::CapacityExceeded);
        }
        Ok(())
    }
}
