use std::collections::BTreeSet;
use crate::error::{AppError, AppResult};
use crate::tables::users::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    Edit,
    Delete,
    ViewRegistrations,
    ManageRegistrations,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<Capability>);
impl Capabilities {
    pub fn all() -> Self {
        Self::from([Capability::Edit, Capability::Delete, Capability::ViewRegistrations, Capability::ManageRegistrations])
    }
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<const N: usize> From<[Capability; N]> for Capabilities {
    fn from(caps: [Capability; N]) -> Self {
        Self(caps.into_iter().collect())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub user_id: UserId,
    pub is_staff: bool,
}

/// The owner relations of a resource, as loaded from its join tables.
#[derive(Clone, Copy, Debug)]
pub enum Resource<'a> {
    Game { creators: &'a [UserId] },
    Convention { organizers: &'a [UserId] },
    ConventionEvent { organizers: &'a [UserId], convention_organizers: &'a [UserId] },
    Run { masters: &'a [UserId], event_organizers: &'a [UserId] },
}

pub fn capabilities(actor: &Actor, resource: &Resource<'_>) -> Capabilities {
    if actor.is_staff {
        return Capabilities::all();
    }
    let me = &actor.user_id;
    match resource {
        Resource::Game { creators } if creators.contains(me) => {
            Capabilities::from([Capability::Edit, Capability::Delete])
        }
        Resource::Convention { organizers } if organizers.contains(me) => {
            Capabilities::from([Capability::Edit, Capability::Delete])
        }
        Resource::ConventionEvent { organizers, convention_organizers }
            if organizers.contains(me) || convention_organizers.contains(me) => Capabilities::all(),
        Resource::Run { masters, .. } if masters.contains(me) => Capabilities::all(),
        // organizers look after registrations of runs at their event, the run itself stays with its masters
        Resource::Run { event_organizers, .. } if event_organizers.contains(me) => {
            Capabilities::from([Capability::ViewRegistrations, Capability::ManageRegistrations])
        }
        _ => Capabilities::default(),
    }
}

pub fn require(actor: &Actor, resource: &Resource<'_>, capability: Capability) -> AppResult<()> {
    if capabilities(actor, resource).contains(capability) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("User id={} lacks {capability:?} permission", actor.user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Actor = Actor { user_id: 1, is_staff: false };
    const BOB: Actor = Actor { user_id: 2, is_staff: false };
    const STAFF: Actor = Actor { user_id: 3, is_staff: true };

    #[test]
    fn test_run_capabilities() {
        let run = Resource::Run { masters: &[1], event_organizers: &[2] };
        assert_eq!(capabilities(&ALICE, &run), Capabilities::all());
        let bob = capabilities(&BOB, &run);
        assert!(bob.contains(Capability::ManageRegistrations));
        assert!(!bob.contains(Capability::Edit));
        assert!(capabilities(&Actor { user_id: 9, is_staff: false }, &run).is_empty());
        assert_eq!(capabilities(&STAFF, &run), Capabilities::all());
    }

    #[test]
    fn test_convention_event_inherits_convention_organizers() {
        let event = Resource::ConventionEvent { organizers: &[], convention_organizers: &[2] };
        assert!(capabilities(&ALICE, &event).is_empty());
        assert!(require(&BOB, &event, Capability::ManageRegistrations).is_ok());
    }

    #[test]
    fn test_game_creators() {
        let game = Resource::Game { creators: &[1] };
        assert!(require(&ALICE, &game, Capability::Edit).is_ok());
        assert!(!capabilities(&ALICE, &game).contains(Capability::ManageRegistrations));
        assert!(matches!(require(&BOB, &game, Capability::Delete), Err(AppError::Forbidden(_))));
    }
}
