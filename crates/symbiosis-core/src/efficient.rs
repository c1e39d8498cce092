//! Symbionts whose resource intake is scaled by an evolving efficiency.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::{OrganismError, check_probability};
use crate::host::Host;
use crate::organism::{Genome, Organism, Vitals};
use crate::random;
use crate::symbiont::{Symbiont, SymbiontState, process_symbiont};
use crate::world::World;
use rand::RngCore;

#[derive(Debug, Clone)]
pub struct EfficientSymbiont {
    state: SymbiontState,
    efficiency: f64,
}

impl EfficientSymbiont {
    pub fn new(
        interaction_val: f64,
        infection_chance: f64,
        efficiency: f64,
    ) -> Result<Self, OrganismError> {
        Ok(Self {
            state: SymbiontState::new(interaction_val, infection_chance)?,
            efficiency: check_probability("efficiency", efficiency)?,
        })
    }

    #[must_use]
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

impl Organism for EfficientSymbiont {
    fn kind(&self) -> &'static str {
        "efficient_symbiont"
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

    /// Efficiency has its own rate but shares the mode's mutation size.
    fn mutate(&mut self, rng: &mut dyn RngCore, config: &SymbiosisConfig, mode: MutationMode) {
        self.state.mutate(rng, config, mode);
        if random::chance(rng, config.efficiency_mutation_rate()) {
            self.efficiency = random::perturb(
                rng,
                self.efficiency,
                config.mutation_size_for(mode),
                0.0,
                1.0,
            );
        }
    }

    fn genome(&self) -> Genome {
        Genome {
            efficiency: Some(self.efficiency),
            ..self.state.genome(self.kind())
        }
    }

    fn add_points(&mut self, amount: f64) {
        self.state.vitals.points += amount * self.efficiency;
    }
}

impl Symbiont for EfficientSymbiont {
    fn state(&self) -> &SymbiontState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SymbiontState {
        &mut self.state
    }

    fn reproduce(
        &self,
        rng: &mut dyn RngCore,
        config: &SymbiosisConfig,
        mode: MutationMode,
    ) -> Box<dyn Symbiont> {
        let mut child = Self {
            state: self.state.offspring(),
            efficiency: self.efficiency,
        };
        child.mutate(rng, config, mode);
        Box::new(child)
    }

    fn process(&mut self, world: &mut World, _host: Option<&mut dyn Host>, location: usize) {
        process_symbiont(self, world, location);
    }
}
