//! Hosts: organisms that occupy a cell, collect resources and carry symbionts.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::{OrganismError, check_interaction};
use crate::organism::{Genome, Lifeform, Organism, Vitals};
use crate::symbiont::Symbiont;
use crate::world::World;
use crate::{OrganismId, random, resources};
use rand::RngCore;

/// State shared by every host kind.
#[derive(Debug)]
pub struct HostState {
    pub vitals: Vitals,
    interaction_val: f64,
    /// Resident symbionts, in admission order.
    pub symbionts: Vec<OrganismId>,
    /// Offspring staged by lytic phage, released when the host bursts.
    pub repro_symbionts: Vec<Box<dyn Symbiont>>,
}

impl HostState {
    pub fn new(interaction_val: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            vitals: Vitals::default(),
            interaction_val: check_interaction(interaction_val)?,
            symbionts: Vec::new(),
            repro_symbionts: Vec::new(),
        })
    }

    /// Copy of the heritable state with fresh vitals and no symbionts.
    #[must_use]
    pub fn offspring(&self) -> Self {
        Self {
            vitals: self.vitals.offspring(),
            interaction_val: self.interaction_val,
            symbionts: Vec::new(),
            repro_symbionts: Vec::new(),
        }
    }

    #[must_use]
    pub fn interaction_val(&self) -> f64 {
        self.interaction_val
    }

    pub fn set_interaction_val(&mut self, value: f64) -> Result<(), OrganismError> {
        self.interaction_val = check_interaction(value)?;
        Ok(())
    }

    /// Base mutation shared by all hosts.
    pub fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode) {
        if random::chance(rng, config.mutation_rate_for(mode)) {
            self.interaction_val = random::perturb(
                rng,
                self.interaction_val,
                config.mutation_size_for(mode),
                -1.0,
                1.0,
            );
        }
    }
}

/// Capabilities every host kind provides to the scheduler.
///
/// Implementations usually forward [`Host::distribute`] and [`Host::process`] to
/// [`distribute_resources`] and [`process_host`], layering their own behaviour around them.
pub trait Host: Organism {
    fn state(&self) -> &HostState;

    fn state_mut(&mut self) -> &mut HostState;

    /// Offspring with a copied, vertically mutated genome.
    fn reproduce(&self, rng: &mut dyn RngCore, config: &SymbiosisConfig) -> Box<dyn Host>;

    /// Split one update's resources between the host and its symbionts.
    fn distribute(&mut self, resources: f64, world: &mut World);

    /// Run one update for the host at `location`.
    fn process(&mut self, world: &mut World, location: usize);

    /// Resources returned by a lysogenic phage holding `share`.
    fn lysogen_return(&self, share: f64, _phage_inc_val: f64, _synergy: f64) -> f64 {
        share
    }

    /// Incorporation value, for hosts that have one.
    fn incorporation_val(&self) -> Option<f64> {
        None
    }

    fn symbionts(&self) -> &[OrganismId] {
        &self.state().symbionts
    }

    fn has_symbionts(&self) -> bool {
        !self.state().symbionts.is_empty()
    }
}

/// Per-symbiont resource distribution; a host without symbionts keeps `R(1 - |hv|)`.
pub fn distribute_resources(host: &mut dyn Host, resources: f64, world: &mut World) {
    let count = host.state().symbionts.len();
    if count == 0 {
        let gain = resources::solo(resources, host.interaction_val());
        host.add_points(gain);
        return;
    }

    let share = resources / count as f64;
    for id in host.state().symbionts.clone() {
        let Some(mut sym) = world.checkout_symbiont(id) else {
            continue;
        };
        let gain = sym.process_resources(share, host, world.config());
        world.restore(id, Lifeform::Symbiont(sym));
        host.add_points(gain);
    }
}

/// One update of the host lifecycle: age, feed, reproduce, then run resident symbionts.
pub fn process_host(host: &mut dyn Host, world: &mut World, location: usize) {
    host.grow_older(world.config().host_age_max);
    if host.is_dead() {
        return;
    }

    let resources = world.pull_resources(world.config().res_distribute);
    host.distribute(resources, world);

    if host.points() >= world.config().host_repro_res && host.state().repro_symbionts.is_empty() {
        let (rng, config) = world.context();
        let mut baby = host.reproduce(rng, config);
        host.set_points(0.0);
        for id in host.state().symbionts.clone() {
            if let Some(mut sym) = world.checkout_symbiont(id) {
                sym.vertical_transmission(world, baby.as_mut());
                world.restore(id, Lifeform::Symbiont(sym));
            }
        }
        world.do_birth(baby, location);
    }

    let mut index = 0;
    while index < host.state().symbionts.len() {
        if host.is_dead() {
            return;
        }
        let id = host.state().symbionts[index];
        let Some(mut sym) = world.checkout_symbiont(id) else {
            host.state_mut().symbionts.remove(index);
            continue;
        };
        if !sym.is_dead() {
            sym.process(world, Some(&mut *host), location);
        }
        let dead = sym.is_dead();
        world.restore(id, Lifeform::Symbiont(sym));
        if dead {
            host.state_mut().symbionts.remove(index);
            world.bury(id);
        } else {
            index += 1;
        }
    }
}

/// The plain host used by the default mode.
#[derive(Debug)]
pub struct BasicHost {
    state: HostState,
}

impl BasicHost {
    pub fn new(interaction_val: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            state: HostState::new(interaction_val)?,
        })
    }
}

impl Organism for BasicHost {
    fn kind(&self) -> &'static str {
        "host"
    }

    fn vitals(&self) -> &Vitals {
        &self.state.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.state.vitals
    }

    fn interaction_val(&self) -> f64 {
        self.state.interaction_val()
    }

    fn set_interaction_val(&mut self, value: f64) -> Result<(), OrganismError> {
        self.state.set_interaction_val(value)
    }

    fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode) {
        self.state.mutate(rng, config, mode);
    }

    fn genome(&self) -> Genome {
        Genome::new(self.kind(), self.interaction_val())
    }
}

impl Host for BasicHost {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }

    fn reproduce(&self, rng: &mut dyn RngCore, config: &SymbiosisConfig) -> Box<dyn Host> {
        let mut baby = Self {
            state: self.state.offspring(),
        };
        baby.mutate(rng, config, MutationMode::Vertical);
        Box::new(baby)
    }

    fn distribute(&mut self, resources: f64, world: &mut World) {
        distribute_resources(self, resources, world);
    }

    fn process(&mut self, world: &mut World, location: usize) {
        process_host(self, world, location);
    }
}
