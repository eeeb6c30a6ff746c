//! Hybrid genetic/memetic search over joint configurations.
//!
//! One persistent population is advanced a generation at a time by
//! [`Evolution::evolve`]. Elites survive and are refined by a per-gene line
//! search guided by the model's heuristic error; the remaining slots are
//! bred from a rank-weighted mating pool. The best configuration seen since
//! construction is kept as the [`Evolution::solution`] and never regresses.

use std::cmp::Ordering;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::model::{Model, uniform};

// ---------------------------------------------------------------------------
// Individual
// ---------------------------------------------------------------------------

/// A candidate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub genes: Vec<f32>,
    /// Per-gene step history used as search momentum.
    pub gradient: Vec<f32>,
    /// Lower is better.
    pub fitness: f32,
    /// Rank-derived mutation pressure in `[0, 1]`; 0 for the best.
    pub extinction: f32,
}

impl Individual {
    fn new(dimensionality: usize) -> Self {
        Self {
            genes: vec![0.0; dimensionality],
            gradient: vec![0.0; dimensionality],
            fitness: 0.0,
            extinction: 0.0,
        }
    }
}

/// Ascending by fitness, NaN last.
fn by_fitness(a: &Individual, b: &Individual) -> Ordering {
    match (a.fitness.is_nan(), b.fitness.is_nan()) {
        (false, false) => a.fitness.total_cmp(&b.fitness),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

// ---------------------------------------------------------------------------
// Evolution
// ---------------------------------------------------------------------------

/// Population state plus the model it evaluates against.
#[derive(Debug, Clone)]
pub struct Evolution {
    model: Model,
    rng: ChaCha8Rng,
    size: usize,
    elites: usize,
    dimensionality: usize,
    population: Vec<Individual>,
    offspring: Vec<Individual>,
    solution: Vec<f32>,
    storage: Vec<f32>,
    probabilities: Vec<f32>,
    wipeouts: u64,
}

impl Evolution {
    /// Seed the population around the model's current joint targets.
    ///
    /// `size` is raised to at least 1 and `elites` lowered to at most
    /// `size`.
    pub fn new(model: Model, size: usize, elites: usize, rng: ChaCha8Rng) -> Self {
        let size = size.max(1);
        let dimensionality = model.dimensionality();
        let solution = model.target_configuration();
        let mut evolution = Self {
            model,
            rng,
            size,
            elites: elites.min(size),
            dimensionality,
            population: (0..size).map(|_| Individual::new(dimensionality)).collect(),
            offspring: (0..size).map(|_| Individual::new(dimensionality)).collect(),
            solution,
            storage: vec![0.0; dimensionality],
            probabilities: vec![0.0; size],
            wipeouts: 0,
        };
        evolution.initialize();
        evolution.try_update_solution();
        evolution
    }

    /// Run one generation. Returns whether the solution improved.
    pub fn evolve(&mut self) -> bool {
        if self.dimensionality == 0 {
            return false;
        }

        for i in 0..self.elites {
            self.survive(i);
        }

        let mut pool: Vec<usize> = (0..self.size).collect();
        for i in self.elites..self.size {
            if pool.is_empty() {
                self.reroll(i);
                continue;
            }
            let parent_a = self.select(&pool);
            let parent_b = self.select(&pool);
            let prototype = self.select(&pool);

            self.reproduce(i, parent_a, parent_b, prototype);

            let fitness = self.offspring[i].fitness;
            for parent in [parent_a, parent_b] {
                if fitness < self.population[parent].fitness {
                    pool.retain(|&p| p != parent);
                }
            }
        }

        std::mem::swap(&mut self.population, &mut self.offspring);
        self.sort_by_fitness();
        self.compute_extinctions();

        if self.try_update_solution() {
            return true;
        }
        if self.check_wipeout() {
            self.wipeouts += 1;
            trace!(wipeouts = self.wipeouts, "population wiped out, reinitializing");
            self.initialize();
            return self.try_update_solution();
        }
        false
    }

    // -- accessors --

    pub const fn model(&self) -> &Model {
        &self.model
    }

    pub const fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Best configuration found so far.
    pub fn solution(&self) -> &[f32] {
        &self.solution
    }

    /// Current population, best first.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn elites(&self) -> usize {
        self.elites
    }

    /// Number of reinitializations after a collapsed population.
    pub const fn wipeouts(&self) -> u64 {
        self.wipeouts
    }

    /// Balanced fitness of the solution against the current objectives.
    pub fn solution_fitness(&mut self) -> f32 {
        self.model.compute_fitness(&self.solution, true, false, &mut self.rng)
    }

    /// Whether the solution meets every tip's tolerances.
    pub fn is_solution_converged(&mut self) -> bool {
        self.model.is_converged(&self.solution)
    }

    // -- operators --

    fn initialize(&mut self) {
        let Self {
            model,
            rng,
            population,
            solution,
            ..
        } = self;

        let first = &mut population[0];
        first.genes.copy_from_slice(solution);
        first.gradient.fill(0.0);
        first.fitness = model.compute_fitness(&first.genes, false, false, rng);

        for individual in population.iter_mut().skip(1) {
            for (gene, motion) in individual.genes.iter_mut().zip(model.motions()) {
                *gene = uniform(rng, motion.lower_limit(), motion.upper_limit());
            }
            individual.gradient.fill(0.0);
            individual.fitness = model.compute_fitness(&individual.genes, false, false, rng);
        }

        self.sort_by_fitness();
        self.compute_extinctions();
    }

    fn survive(&mut self, index: usize) {
        let survivor = &self.population[index];
        let offspring = &mut self.offspring[index];
        offspring.genes.copy_from_slice(&survivor.genes);
        offspring.gradient.copy_from_slice(&survivor.gradient);
        self.exploit(index);
    }

    fn reproduce(&mut self, index: usize, parent_a: usize, parent_b: usize, prototype: usize) {
        let Self {
            model,
            rng,
            population,
            offspring,
            storage,
            dimensionality,
            ..
        } = self;
        let a = &population[parent_a];
        let b = &population[parent_b];
        let p = &population[prototype];
        let child = &mut offspring[index];

        let extinction = 0.5 * (a.extinction + b.extinction);
        let probability = mutation_probability(extinction, *dimensionality);

        for (i, motion) in model.motions().iter().enumerate() {
            // Recombination
            let weight = rng.r#gen::<f32>();
            let mut gene = weight * a.genes[i]
                + (1.0 - weight) * b.genes[i]
                + rng.r#gen::<f32>() * a.gradient[i]
                + rng.r#gen::<f32>() * b.gradient[i];
            storage[i] = gene;

            // Mutation
            if rng.r#gen::<f32>() < probability {
                let span = motion.upper_limit() - motion.lower_limit();
                gene += uniform(rng, -1.0, 1.0) * span * extinction;
            }

            // Adoption
            let weight = rng.r#gen::<f32>();
            gene += weight * rng.r#gen::<f32>() * (0.5 * (a.genes[i] + b.genes[i]) - gene)
                + (1.0 - weight) * rng.r#gen::<f32>() * (p.genes[i] - gene);

            let gene = motion.motion().constrain_to_limits(gene);
            child.genes[i] = gene;
            child.gradient[i] = rng.r#gen::<f32>() * child.gradient[i] + (gene - storage[i]);
        }

        child.fitness = model.compute_fitness(&child.genes, false, false, rng);
    }

    fn reroll(&mut self, index: usize) {
        let Self {
            model,
            rng,
            offspring,
            ..
        } = self;
        let child = &mut offspring[index];
        for (gene, motion) in child.genes.iter_mut().zip(model.motions()) {
            *gene = uniform(rng, motion.lower_limit(), motion.upper_limit());
        }
        child.gradient.fill(0.0);
        child.fitness = model.compute_fitness(&child.genes, false, false, rng);
    }

    /// Per-gene line search: probe ± a step sized by the gene's heuristic
    /// error and keep the better of the two if it beats the incumbent.
    #[allow(clippy::cast_precision_loss)]
    fn exploit(&mut self, index: usize) {
        let Self {
            model,
            rng,
            offspring,
            dimensionality,
            ..
        } = self;
        let individual = &mut offspring[index];

        let mut fitness_sum = 0.0;
        for i in 0..*dimensionality {
            let fitness = model.compute_fitness(&individual.genes, false, true, rng);
            let step = model.heuristic_error(i);
            let gene = individual.genes[i];

            let inc = model.constrain(i, gene + uniform(rng, 0.0, step)) - gene;
            individual.genes[i] = gene + inc;
            let inc_fitness = model.compute_fitness(&individual.genes, false, false, rng);

            let dec = model.constrain(i, gene - uniform(rng, 0.0, step)) - gene;
            individual.genes[i] = gene + dec;
            let dec_fitness = model.compute_fitness(&individual.genes, false, false, rng);

            individual.genes[i] = gene;
            if inc_fitness <= dec_fitness && inc_fitness < fitness {
                individual.genes[i] = gene + inc;
                individual.gradient[i] = rng.r#gen::<f32>() * individual.gradient[i] + inc;
                fitness_sum += inc_fitness;
            } else if dec_fitness <= inc_fitness && dec_fitness < fitness {
                individual.genes[i] = gene + dec;
                individual.gradient[i] = rng.r#gen::<f32>() * individual.gradient[i] + dec;
                fitness_sum += dec_fitness;
            } else {
                fitness_sum += fitness;
            }
        }
        individual.fitness = fitness_sum / *dimensionality as f32;
    }

    /// True when no single-gene probe around the best individual improves
    /// its balanced fitness.
    fn check_wipeout(&mut self) -> bool {
        let Self {
            model,
            rng,
            population,
            storage,
            dimensionality,
            ..
        } = self;
        storage.copy_from_slice(&population[0].genes);

        for i in 0..*dimensionality {
            let fitness = model.compute_fitness(&storage[..], true, true, rng);
            let step = model.heuristic_error(i);
            let gene = storage[i];

            let inc = model.constrain(i, gene + uniform(rng, 0.0, step)) - gene;
            storage[i] = gene + inc;
            let inc_fitness = model.compute_fitness(&storage[..], true, false, rng);

            let dec = model.constrain(i, gene - uniform(rng, 0.0, step)) - gene;
            storage[i] = gene + dec;
            let dec_fitness = model.compute_fitness(&storage[..], true, false, rng);

            storage[i] = gene;
            if inc_fitness < fitness || dec_fitness < fitness {
                return false;
            }
        }
        true
    }

    fn try_update_solution(&mut self) -> bool {
        let solution_fitness = self
            .model
            .compute_fitness(&self.solution, true, false, &mut self.rng);
        let candidate_fitness = self.model.compute_fitness(
            &self.population[0].genes,
            true,
            false,
            &mut self.rng,
        );
        if candidate_fitness < solution_fitness {
            self.solution.copy_from_slice(&self.population[0].genes);
            true
        } else {
            false
        }
    }

    /// Rank-weighted draw from the mating pool; returns a population index.
    #[allow(clippy::cast_precision_loss)]
    fn select(&mut self, pool: &[usize]) -> usize {
        let count = pool.len();
        let rank_sum = count as f32 * (count as f32 + 1.0) / 2.0;
        for (i, p) in self.probabilities[..count].iter_mut().enumerate() {
            *p = (count - i) as f32 / rank_sum;
        }
        pool[weighted_index(&self.probabilities[..count], &mut self.rng)]
    }

    fn sort_by_fitness(&mut self) {
        self.population.sort_by(by_fitness);
    }

    #[allow(clippy::cast_precision_loss)]
    fn compute_extinctions(&mut self) {
        let n = self.population.len();
        let min = self.population[0].fitness;
        let max = self.population[n - 1].fitness;
        for (i, individual) in self.population.iter_mut().enumerate() {
            let grading = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
            individual.extinction = if max > f32::EPSILON {
                ((individual.fitness + min * (grading - 1.0)) / max).clamp(0.0, 1.0)
            } else {
                grading
            };
        }
    }
}

/// `extinction · (1 − 1/d) + 1/d`: never below `1/d`.
#[allow(clippy::cast_precision_loss)]
fn mutation_probability(extinction: f32, dimensionality: usize) -> f32 {
    let inverse = 1.0 / dimensionality.max(1) as f32;
    extinction * (1.0 - inverse) + inverse
}

/// Cumulative-weighted random index into `weights`.
fn weighted_index(weights: &[f32], rng: &mut impl Rng) -> usize {
    let total: f32 = weights.iter().sum();
    let mut remaining = rng.r#gen::<f32>() * total;
    for (i, weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining <= 0.0 {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
