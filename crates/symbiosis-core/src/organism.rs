//! The capability set shared by every organism kind, and the arena that owns them.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::OrganismError;
use crate::host::Host;
use crate::symbiont::Symbiont;
use crate::{Generation, OrganismId};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::fmt;

/// Lifecycle bookkeeping common to every organism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vitals {
    pub points: f64,
    pub age: u32,
    pub dead: bool,
    /// Arena handle, assigned once the organism is placed.
    pub id: Option<OrganismId>,
    pub parent: Option<OrganismId>,
    pub generation: Generation,
}

impl Vitals {
    /// Fresh vitals for an offspring of the organism owning `self`.
    #[must_use]
    pub fn offspring(&self) -> Self {
        Self {
            points: 0.0,
            age: 0,
            dead: false,
            id: None,
            parent: self.id,
            generation: self.generation.next(),
        }
    }
}

/// Serializable snapshot of an organism's heritable traits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Genome {
    pub kind: String,
    pub interaction_val: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance_of_lysis: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chance_of_induction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorporation_val: Option<f64>,
}

impl Genome {
    /// Genome carrying only an interaction value.
    #[must_use]
    pub fn new(kind: impl Into<String>, interaction_val: f64) -> Self {
        Self {
            kind: kind.into(),
            interaction_val,
            infection_chance: None,
            efficiency: None,
            donation: None,
            chance_of_lysis: None,
            chance_of_induction: None,
            incorporation_val: None,
        }
    }
}

/// Contract every organism honours so the world can schedule it.
pub trait Organism: fmt::Debug + Send {
    /// Static identifier of the organism kind.
    fn kind(&self) -> &'static str;

    fn vitals(&self) -> &Vitals;

    fn vitals_mut(&mut self) -> &mut Vitals;

    fn interaction_val(&self) -> f64;

    /// Replace the interaction value; values outside `[-1, 1]` are rejected, never clamped.
    fn set_interaction_val(&mut self, value: f64) -> Result<(), OrganismError>;

    /// Perturb heritable traits in place.
    fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode);

    fn genome(&self) -> Genome;

    fn points(&self) -> f64 {
        self.vitals().points
    }

    fn set_points(&mut self, points: f64) {
        self.vitals_mut().points = points;
    }

    /// Credit resources earned from the environment or a partner.
    fn add_points(&mut self, amount: f64) {
        self.vitals_mut().points += amount;
    }

    fn age(&self) -> u32 {
        self.vitals().age
    }

    fn is_dead(&self) -> bool {
        self.vitals().dead
    }

    fn set_dead(&mut self) {
        self.vitals_mut().dead = true;
    }

    fn id(&self) -> Option<OrganismId> {
        self.vitals().id
    }

    /// Age by one update, dying once `max_age` is exceeded (0 disables).
    fn grow_older(&mut self, max_age: u32) {
        let vitals = self.vitals_mut();
        vitals.age = vitals.age.saturating_add(1);
        if max_age > 0 && vitals.age > max_age {
            vitals.dead = true;
        }
    }
}

/// An arena resident of either role.
#[derive(Debug)]
pub enum Lifeform {
    Host(Box<dyn Host>),
    Symbiont(Box<dyn Symbiont>),
}

impl Lifeform {
    #[must_use]
    pub fn as_organism(&self) -> &dyn Organism {
        match self {
            Self::Host(host) => host.as_ref(),
            Self::Symbiont(sym) => sym.as_ref(),
        }
    }

    #[must_use]
    pub fn as_organism_mut(&mut self) -> &mut dyn Organism {
        match self {
            Self::Host(host) => host.as_mut(),
            Self::Symbiont(sym) => sym.as_mut(),
        }
    }
}

/// Generational storage for every placed organism.
///
/// An organism being processed is checked out of its slot so it can borrow the world
/// mutably; its handle stays valid until it is restored or removed.
#[derive(Debug, Default)]
pub struct OrganismArena {
    slots: SlotMap<OrganismId, Option<Lifeform>>,
}

impl OrganismArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Number of live handles, checked out or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when no organisms are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if `id` refers to a stored organism.
    #[must_use]
    pub fn contains(&self, id: OrganismId) -> bool {
        self.slots.contains_key(id)
    }

    /// Insert an organism, stamping its handle into its vitals.
    pub fn insert(&mut self, mut form: Lifeform) -> OrganismId {
        self.slots.insert_with_key(|id| {
            form.as_organism_mut().vitals_mut().id = Some(id);
            Some(form)
        })
    }

    /// Remove `id`, returning the organism unless it is checked out.
    pub fn remove(&mut self, id: OrganismId) -> Option<Lifeform> {
        self.slots.remove(id).flatten()
    }

    #[must_use]
    pub fn get(&self, id: OrganismId) -> Option<&dyn Organism> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .map(Lifeform::as_organism)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: OrganismId) -> Option<&mut dyn Organism> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .map(Lifeform::as_organism_mut)
    }

    #[must_use]
    pub fn host(&self, id: OrganismId) -> Option<&dyn Host> {
        match self.slots.get(id) {
            Some(Some(Lifeform::Host(host))) => Some(host.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn host_mut(&mut self, id: OrganismId) -> Option<&mut dyn Host> {
        match self.slots.get_mut(id) {
            Some(Some(Lifeform::Host(host))) => Some(host.as_mut()),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbiont(&self, id: OrganismId) -> Option<&dyn Symbiont> {
        match self.slots.get(id) {
            Some(Some(Lifeform::Symbiont(sym))) => Some(sym.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbiont_mut(&mut self, id: OrganismId) -> Option<&mut dyn Symbiont> {
        match self.slots.get_mut(id) {
            Some(Some(Lifeform::Symbiont(sym))) => Some(sym.as_mut()),
            _ => None,
        }
    }

    /// Take a host out of its slot for processing.
    pub fn checkout_host(&mut self, id: OrganismId) -> Option<Box<dyn Host>> {
        let slot = self.slots.get_mut(id)?;
        match slot.take() {
            Some(Lifeform::Host(host)) => Some(host),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Take a symbiont out of its slot for processing.
    pub fn checkout_symbiont(&mut self, id: OrganismId) -> Option<Box<dyn Symbiont>> {
        let slot = self.slots.get_mut(id)?;
        match slot.take() {
            Some(Lifeform::Symbiont(sym)) => Some(sym),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Return a checked-out organism to its slot. Returns false if the slot is gone.
    pub fn restore(&mut self, id: OrganismId, form: Lifeform) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => {
                *slot = Some(form);
                true
            }
            None => false,
        }
    }
}
