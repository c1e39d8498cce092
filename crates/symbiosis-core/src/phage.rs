//! Temperate phage and the bacteria they infect.

use crate::config::{MutationMode, SymbiosisConfig};
use crate::error::{OrganismError, WorldError, check_probability};
use crate::host::{Host, HostState, distribute_resources, process_host};
use crate::organism::{Genome, Organism, Vitals};
use crate::random;
use crate::symbiont::{Symbiont, SymbiontState, exchange_resources, process_symbiont};
use crate::world::World;
use rand::RngCore;
use tracing::debug;

/// Host whose genome carries an incorporation value for prophage placement.
#[derive(Debug)]
pub struct Bacterium {
    state: HostState,
    incorporation_val: f64,
}

impl Bacterium {
    pub fn new(interaction_val: f64, incorporation_val: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            state: HostState::new(interaction_val)?,
            incorporation_val: check_probability("incorporation value", incorporation_val)?,
        })
    }
}

impl Organism for Bacterium {
    fn kind(&self) -> &'static str {
        "bacterium"
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
        if config.mutate_host_inc_val && random::chance(rng, config.mutation_rate_for(mode)) {
            self.incorporation_val = random::perturb(
                rng,
                self.incorporation_val,
                config.mutation_size_for(mode),
                0.0,
                1.0,
            );
        }
    }

    fn genome(&self) -> Genome {
        Genome {
            incorporation_val: Some(self.incorporation_val),
            ..Genome::new(self.kind(), self.interaction_val())
        }
    }
}

impl Host for Bacterium {
    fn state(&self) -> &HostState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }

    fn reproduce(&self, rng: &mut dyn RngCore, config: &SymbiosisConfig) -> Box<dyn Host> {
        let mut baby = Self {
            state: self.state.offspring(),
            incorporation_val: self.incorporation_val,
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

    /// A well-placed prophage amplifies the share it leaves to the bacterium.
    fn lysogen_return(&self, share: f64, phage_inc_val: f64, synergy: f64) -> f64 {
        synergy * share * (1.0 - (self.incorporation_val - phage_inc_val).abs())
    }

    fn incorporation_val(&self) -> Option<f64> {
        Some(self.incorporation_val)
    }
}

/// Temperate phage: lytic phage replicate inside and burst their host, lysogens lie dormant.
#[derive(Debug, Clone)]
pub struct Phage {
    state: SymbiontState,
    lysogeny: bool,
    burst_timer: f64,
    chance_of_lysis: f64,
    chance_of_induction: f64,
    incorporation_val: f64,
}

impl Phage {
    /// A lytic phage that always lyses on entry and never induces.
    pub fn new(interaction_val: f64, infection_chance: f64) -> Result<Self, OrganismError> {
        Ok(Self {
            state: SymbiontState::new(interaction_val, infection_chance)?,
            lysogeny: false,
            burst_timer: 0.0,
            chance_of_lysis: 1.0,
            chance_of_induction: 0.0,
            incorporation_val: 0.0,
        })
    }

    pub fn with_lysis_chance(mut self, chance: f64) -> Result<Self, OrganismError> {
        self.chance_of_lysis = check_probability("lysis chance", chance)?;
        Ok(self)
    }

    pub fn with_induction_chance(mut self, chance: f64) -> Result<Self, OrganismError> {
        self.chance_of_induction = check_probability("induction chance", chance)?;
        Ok(self)
    }

    pub fn with_incorporation_val(mut self, value: f64) -> Result<Self, OrganismError> {
        self.incorporation_val = check_probability("incorporation value", value)?;
        Ok(self)
    }

    #[must_use]
    pub fn is_lysogenic(&self) -> bool {
        self.lysogeny
    }

    #[must_use]
    pub fn burst_timer(&self) -> f64 {
        self.burst_timer
    }

    pub fn set_burst_timer(&mut self, value: f64) {
        self.burst_timer = value;
    }

    #[must_use]
    pub fn chance_of_lysis(&self) -> f64 {
        self.chance_of_lysis
    }

    #[must_use]
    pub fn chance_of_induction(&self) -> f64 {
        self.chance_of_induction
    }

    #[must_use]
    pub fn incorporation_val(&self) -> f64 {
        self.incorporation_val
    }

    /// Switch to the lytic strategy.
    pub fn induce(&mut self) {
        self.lysogeny = false;
        self.state.force_interaction_val(-1.0);
    }

    fn become_lysogen(&mut self) {
        self.lysogeny = true;
        self.state.force_interaction_val(0.0);
    }

    /// Burst the host once the timer is up, otherwise grow the timer and stage offspring.
    fn lytic_update(&mut self, world: &mut World, host: &mut dyn Host, location: usize) {
        if self.burst_timer >= world.config().burst_time {
            let staged = std::mem::take(&mut host.state_mut().repro_symbionts);
            debug!(location, burst_size = staged.len(), "phage burst");
            for child in staged {
                world.sym_do_birth(child, location);
            }
            host.set_dead();
            return;
        }

        let (rng, config) = world.context();
        self.burst_timer += random::normal(rng, 1.0, 1.0);
        let cost = config.sym_lysis_res;
        if cost <= 0.0 {
            world.halt(WorldError::DegenerateLysisCost(cost));
            return;
        }
        while self.points() >= cost {
            let (rng, config) = world.context();
            let child = self.reproduce(rng, config, MutationMode::Vertical);
            host.state_mut().repro_symbionts.push(child);
            self.set_points(self.points() - cost);
        }
    }
}

impl Organism for Phage {
    fn kind(&self) -> &'static str {
        "phage"
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
        let rate = config.mutation_rate_for(mode);
        let size = config.mutation_size_for(mode);
        if config.mutate_lysis_chance && random::chance(rng, rate) {
            self.chance_of_lysis = random::perturb(rng, self.chance_of_lysis, size, 0.0, 1.0);
        }
        if config.mutate_induction_chance && random::chance(rng, rate) {
            self.chance_of_induction =
                random::perturb(rng, self.chance_of_induction, size, 0.0, 1.0);
        }
        if config.mutate_phage_inc_val && random::chance(rng, rate) {
            self.incorporation_val = random::perturb(rng, self.incorporation_val, size, 0.0, 1.0);
        }
    }

    fn genome(&self) -> Genome {
        Genome {
            chance_of_lysis: Some(self.chance_of_lysis),
            chance_of_induction: Some(self.chance_of_induction),
            incorporation_val: Some(self.incorporation_val),
            ..self.state.genome(self.kind())
        }
    }
}

impl Symbiont for Phage {
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
            burst_timer: 0.0,
            ..self.clone()
        };
        child.mutate(rng, config, mode);
        Box::new(child)
    }

    fn process(&mut self, world: &mut World, host: Option<&mut dyn Host>, location: usize) {
        let lysis = world.config().lysis;
        let Some(host) = host.filter(|_| lysis) else {
            process_symbiont(self, world, location);
            return;
        };

        self.grow_older(world.config().sym_age_max);
        if self.is_dead() {
            return;
        }
        if self.lysogeny {
            let (rng, config) = world.context();
            if random::chance(rng, self.chance_of_induction) {
                debug!(location, "prophage induced");
                self.induce();
            } else {
                if random::chance(rng, config.prophage_loss_rate) {
                    self.set_dead();
                }
                return;
            }
        }
        self.lytic_update(world, host, location);
    }

    /// Lysogens take nothing from their host; lytic phage play the usual payoff game.
    fn process_resources(
        &mut self,
        share: f64,
        host: &mut dyn Host,
        config: &SymbiosisConfig,
    ) -> f64 {
        if !self.lysogeny {
            return exchange_resources(self, share, host, config);
        }
        if config.benefit_to_host {
            host.lysogen_return(share, self.incorporation_val, config.synergy)
        } else {
            share
        }
    }

    /// Lysogens always follow their host's offspring; lytic phage never do.
    fn vertical_transmission(&mut self, world: &mut World, offspring: &mut dyn Host) {
        if !self.lysogeny {
            return;
        }
        let (rng, config) = world.context();
        let child = self.reproduce(rng, config, MutationMode::Vertical);
        let admitted = world.add_symbiont(offspring, child).is_some();
        world.record_vertical(admitted);
    }

    fn upon_injection(&mut self, rng: &mut dyn RngCore, _config: &SymbiosisConfig) {
        if random::chance(rng, self.chance_of_lysis) {
            self.induce();
        } else {
            self.become_lysogen();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BasicHost;
    use crate::organism::Lifeform;
    use rand::{SeedableRng, rngs::SmallRng};

    fn lysis_world(config: SymbiosisConfig) -> World {
        World::new(SymbiosisConfig {
            grid_x: 3,
            grid_y: 1,
            lysis: true,
            ..config
        })
        .expect("world")
    }

    fn lysogen(induction: f64) -> Phage {
        let mut phage = Phage::new(0.0, 1.0)
            .and_then(|p| p.with_lysis_chance(0.0))
            .and_then(|p| p.with_induction_chance(induction))
            .expect("phage");
        let mut rng = SmallRng::seed_from_u64(1);
        phage.upon_injection(&mut rng, &SymbiosisConfig::default());
        phage
    }

    fn lytic() -> Phage {
        let mut phage = Phage::new(0.0, 1.0).expect("phage");
        let mut rng = SmallRng::seed_from_u64(1);
        phage.upon_injection(&mut rng, &SymbiosisConfig::default());
        phage
    }

    #[test]
    fn injection_chooses_strategy() {
        let phage = lytic();
        assert!(!phage.is_lysogenic());
        assert_eq!(phage.interaction_val(), -1.0);

        let phage = lysogen(0.0);
        assert!(phage.is_lysogenic());
        assert_eq!(phage.interaction_val(), 0.0);
    }

    #[test]
    fn induced_lysogen_acts_lytic_in_the_same_update() {
        let mut world = lysis_world(SymbiosisConfig {
            sym_lysis_res: 5.0,
            burst_time: 100.0,
            ..SymbiosisConfig::default()
        });
        let mut host = BasicHost::new(0.0).expect("host");
        let mut phage = lysogen(1.0);
        phage.set_points(5.0);

        phage.process(&mut world, Some(&mut host), 0);

        assert!(!phage.is_lysogenic());
        assert_eq!(phage.interaction_val(), -1.0);
        assert_eq!(host.state().repro_symbionts.len(), 1);
        assert_eq!(phage.points(), 0.0);
    }

    #[test]
    fn prophage_loss_follows_its_rate() {
        for (rate, dies) in [(1.0, true), (0.0, false)] {
            let mut world = lysis_world(SymbiosisConfig {
                prophage_loss_rate: rate,
                ..SymbiosisConfig::default()
            });
            let mut host = BasicHost::new(0.0).expect("host");
            let mut phage = lysogen(0.0);
            phage.process(&mut world, Some(&mut host), 0);
            assert_eq!(phage.is_dead(), dies);
            assert!(phage.is_lysogenic());
            assert!(!host.is_dead());
        }
    }

    #[test]
    fn burst_releases_staged_offspring_and_kills_host() {
        let mut world = lysis_world(SymbiosisConfig {
            burst_time: 10.0,
            sym_limit: 2,
            ..SymbiosisConfig::default()
        });
        for cell in [1, 2] {
            world.add_org_at(
                Lifeform::Host(Box::new(BasicHost::new(0.0).expect("host"))),
                cell,
            );
        }
        let mut host = BasicHost::new(0.0).expect("host");
        let mut phage = lytic();
        for _ in 0..2 {
            host.state_mut().repro_symbionts.push(Box::new(lytic()));
        }
        phage.set_burst_timer(10.0);

        phage.process(&mut world, Some(&mut host), 0);

        assert!(host.state().repro_symbionts.is_empty());
        assert!(host.is_dead());
        assert_eq!(world.census().hosted_symbionts, 2);
    }

    #[test]
    fn lytic_phage_stages_offspring_while_it_can_pay() {
        let mut world = lysis_world(SymbiosisConfig {
            sym_lysis_res: 5.0,
            burst_time: 100.0,
            ..SymbiosisConfig::default()
        });
        let mut host = BasicHost::new(0.0).expect("host");
        let mut phage = lytic();
        phage.set_points(12.0);

        phage.process(&mut world, Some(&mut host), 0);

        assert_eq!(host.state().repro_symbionts.len(), 2);
        assert_eq!(phage.points(), 2.0);
        assert_ne!(phage.burst_timer(), 0.0);
        let staged = &host.state().repro_symbionts[0];
        assert_eq!(staged.points(), 0.0);
        assert!(!host.is_dead());
    }

    #[test]
    fn zero_lysis_cost_halts_the_world() {
        let mut world = lysis_world(SymbiosisConfig {
            sym_lysis_res: 0.0,
            ..SymbiosisConfig::default()
        });
        let mut host = BasicHost::new(0.0).expect("host");
        let mut phage = lytic();
        phage.process(&mut world, Some(&mut host), 0);
        assert_eq!(world.fault(), Some(&WorldError::DegenerateLysisCost(0.0)));
        assert!(host.state().repro_symbionts.is_empty());
    }

    #[test]
    fn lysogen_resources_depend_on_benefit_flag() {
        let config = SymbiosisConfig {
            synergy: 2.0,
            ..SymbiosisConfig::default()
        };
        let mut bacterium = Bacterium::new(0.0, 0.75).expect("bacterium");
        let mut phage = lysogen(0.0).with_incorporation_val(0.25).expect("phage");

        assert_eq!(phage.process_resources(40.0, &mut bacterium, &config), 40.0);
        let benefit = SymbiosisConfig {
            benefit_to_host: true,
            ..config
        };
        let returned = phage.process_resources(40.0, &mut bacterium, &benefit);
        assert!((returned - 2.0 * 40.0 * 0.5).abs() < 1e-9);
        assert_eq!(phage.points(), 0.0);
    }

    #[test]
    fn only_lysogens_transmit_vertically() {
        let mut world = lysis_world(SymbiosisConfig {
            vertical_transmission: 0.0,
            ..SymbiosisConfig::default()
        });
        let mut baby = BasicHost::new(0.0).expect("host");
        lytic().vertical_transmission(&mut world, &mut baby);
        assert!(baby.symbionts().is_empty());
        lysogen(0.0).vertical_transmission(&mut world, &mut baby);
        assert_eq!(baby.symbionts().len(), 1);
    }

    #[test]
    fn zero_rate_mutation_leaves_phage_traits_unchanged() {
        let mut config = SymbiosisConfig {
            mutate_lysis_chance: true,
            mutate_induction_chance: true,
            mutate_host_inc_val: true,
            mutate_phage_inc_val: true,
            mutation_size: 0.3,
            ..SymbiosisConfig::default()
        };
        config.mutation_rate = 0.0;
        config.horiz_mutation_rate = Some(0.0);
        let mut rng = SmallRng::seed_from_u64(9);
        let mut phage = Phage::new(0.2, 0.4)
            .and_then(|p| p.with_lysis_chance(0.6))
            .and_then(|p| p.with_induction_chance(0.1))
            .and_then(|p| p.with_incorporation_val(0.8))
            .expect("phage");
        let before = phage.genome();
        for mode in [MutationMode::Vertical, MutationMode::Horizontal] {
            phage.mutate(&mut rng, &config, mode);
        }
        assert_eq!(phage.genome(), before);

        let mut bacterium = Bacterium::new(-0.2, 0.3).expect("bacterium");
        let before = bacterium.genome();
        bacterium.mutate(&mut rng, &config, MutationMode::Vertical);
        assert_eq!(bacterium.genome(), before);
    }

    #[test]
    fn lysis_traits_mutate_within_bounds() {
        let config = SymbiosisConfig {
            mutate_lysis_chance: true,
            mutate_induction_chance: true,
            mutation_size: 2.0,
            ..SymbiosisConfig::default()
        };
        let mut rng = SmallRng::seed_from_u64(4);
        let mut phage = Phage::new(0.0, 1.0).expect("phage");
        for _ in 0..100 {
            phage.mutate(&mut rng, &config, MutationMode::Horizontal);
            assert!((0.0..=1.0).contains(&phage.chance_of_lysis()));
            assert!((0.0..=1.0).contains(&phage.chance_of_induction()));
        }
    }

    #[test]
    fn bacterium_incorporation_mutates_only_under_the_host_flag() {
        let mut config = SymbiosisConfig {
            mutation_size: 0.002,
            mutate_phage_inc_val: true,
            ..SymbiosisConfig::default()
        };
        config.mutation_rate = 1.0;
        let mut rng = SmallRng::seed_from_u64(21);

        let mut bacterium = Bacterium::new(0.0, 0.5).expect("bacterium");
        bacterium.mutate(&mut rng, &config, MutationMode::Vertical);
        assert_eq!(bacterium.incorporation_val(), Some(0.5));

        config.mutate_host_inc_val = true;
        bacterium.mutate(&mut rng, &config, MutationMode::Vertical);
        let mutated = bacterium.incorporation_val().expect("bacteria carry a value");
        assert_ne!(mutated, 0.5);
        assert!((0.0..=1.0).contains(&mutated));

        let baby = bacterium.reproduce(&mut rng, &config);
        assert!(baby.incorporation_val().is_some());
        assert_eq!(BasicHost::new(0.0).expect("host").incorporation_val(), None);
    }

    #[test]
    fn phage_incorporation_mutates_only_under_the_phage_flag() {
        let mut config = SymbiosisConfig {
            mutation_size: 0.002,
            mutate_host_inc_val: true,
            ..SymbiosisConfig::default()
        };
        config.mutation_rate = 1.0;
        config.horiz_mutation_rate = Some(1.0);
        let mut rng = SmallRng::seed_from_u64(22);

        let mut phage = Phage::new(0.0, 1.0)
            .and_then(|p| p.with_incorporation_val(0.5))
            .expect("phage");
        phage.mutate(&mut rng, &config, MutationMode::Horizontal);
        assert_eq!(phage.incorporation_val(), 0.5);

        config.mutate_phage_inc_val = true;
        phage.mutate(&mut rng, &config, MutationMode::Horizontal);
        assert_ne!(phage.incorporation_val(), 0.5);
        assert!((0.0..=1.0).contains(&phage.incorporation_val()));
    }
}
