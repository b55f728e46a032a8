/*! Derivative-free fallback solver: simulated annealing over the joint
angles.

Uses nothing but the forward pass and the validity check of the owning
[ArmSolution], so it keeps working where the Jacobian solver cannot (e.g.
hard configuration constraints). One [AnnealingSolver::solve] call runs the
whole cooling schedule and leaves the solution at the accepted candidate. */

use crate::errors::ArmatureError;
use crate::linear::Vec3;
use crate::solution::ArmSolution;
use rand::Rng;
use tracing::debug;

/// An evaluated candidate: the joint vector, its scalar cost and the world
/// positions it produced.
#[derive(Debug, Clone)]
pub struct SolutionAndCost {
    pub thetas: Vec<f64>,
    pub cost: f64,
    pub positions: Vec<Vec3>,
}

/// Cooling schedule and proposal counts.
#[derive(Debug, Clone, Copy)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub min_temperature: f64,
    /// Multiplicative cooling factor per outer round.
    pub cooling: f64,
    /// Metropolis proposals per temperature.
    pub tries_per_temperature: usize,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        AnnealingConfig {
            initial_temperature: 1.0,
            min_temperature: 1e-5,
            cooling: 0.9,
            tries_per_temperature: 50,
        }
    }
}

/// Resample attempts before a proposal degrades to "no move" instead of
/// spinning on an unsatisfiable validity check.
const MAX_NEIGHBOR_TRIES: usize = 10_000;

/// Simulated annealing over an [ArmSolution]. Carries the previously
/// accepted solution between calls for the continuity cost terms.
#[derive(Debug, Default)]
pub struct AnnealingSolver {
    config: AnnealingConfig,
    previous: Option<SolutionAndCost>,
}

impl AnnealingSolver {
    pub fn new(config: AnnealingConfig) -> Self {
        AnnealingSolver {
            config,
            previous: None,
        }
    }

    pub fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    /// Run the full cooling schedule. The solution ends up carrying the
    /// returned candidate's joint vector.
    pub fn solve<R: Rng>(
        &mut self,
        solution: &mut ArmSolution,
        rng: &mut R,
    ) -> Result<SolutionAndCost, ArmatureError> {
        // The continuity terms score every candidate of this call against
        // the solution accepted by the previous call.
        let previous = self.previous.clone();
        let mut current = evaluate(solution, previous.as_ref());

        let mut temperature = self.config.initial_temperature;
        while temperature > self.config.min_temperature {
            for _ in 0..self.config.tries_per_temperature {
                let candidate = neighbor(solution, &current, previous.as_ref(), rng)?;
                let acceptance = ((current.cost - candidate.cost) / temperature).exp();
                if acceptance > rng.gen::<f64>() {
                    current = candidate;
                } else {
                    solution.apply_solution(&current.thetas)?;
                }
            }
            temperature *= self.config.cooling;
        }

        solution.apply_solution(&current.thetas)?;
        debug!(cost = current.cost, "annealing settled");
        self.previous = Some(current.clone());
        Ok(current)
    }
}

/// Perturb one uniformly chosen movable joint to a uniform sample within its
/// limits, resampling until the configuration is valid.
fn neighbor<R: Rng>(
    solution: &mut ArmSolution,
    current: &SolutionAndCost,
    previous: Option<&SolutionAndCost>,
    rng: &mut R,
) -> Result<SolutionAndCost, ArmatureError> {
    let movable: Vec<(usize, f64, f64)> = solution
        .tree()
        .nodes()
        .enumerate()
        .filter(|(_, n)| n.is_joint() && !n.is_frozen())
        .map(|(i, n)| {
            let (lo, hi) = n.limits();
            (i, lo, hi)
        })
        .collect();
    if movable.is_empty() {
        return Ok(current.clone());
    }

    for _ in 0..MAX_NEIGHBOR_TRIES {
        let &(index, lo, hi) = &movable[rng.gen_range(0..movable.len())];
        let mut thetas = current.thetas.clone();
        thetas[index] = rng.gen_range(lo..=hi);
        solution.apply_solution(&thetas)?;
        if solution.solution_is_valid() {
            return Ok(evaluate(solution, previous));
        }
    }

    // Nothing valid found; fall back to standing still
    solution.apply_solution(&current.thetas)?;
    Ok(current.clone())
}

/// The annealing cost of the solution's current configuration: distance to
/// target, plus (against the previous call's result) the signed mean joint
/// drift and the half-weighted mean positional discontinuity.
fn evaluate(solution: &ArmSolution, previous: Option<&SolutionAndCost>) -> SolutionAndCost {
    let thetas = solution.serialize();
    let positions = solution.tree().positions();
    let target = solution.targets()[0];
    let reach = solution
        .effector_position(0)
        .map_or(0.0, |p| p.distance(target));

    let mut cost = reach;
    if let Some(prev) = previous {
        let n = thetas.len() as f64;
        // Note: deliberately signed, so the drift term can reward moving
        // "down" across all joints at once
        let drift: f64 = thetas
            .iter()
            .zip(&prev.thetas)
            .map(|(now, before)| now - before)
            .sum::<f64>()
            / n;
        let discontinuity: f64 = positions
            .iter()
            .zip(&prev.positions)
            .map(|(now, before)| now.distance(*before))
            .sum::<f64>()
            / n;
        cost += drift + 0.5 * discontinuity;
    }

    SolutionAndCost {
        thetas,
        cost,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn first_call_cost_is_distance_only() {
        let solution = ArmSolution::new(None).unwrap();
        let scored = evaluate(&solution, None);
        let reach = solution
            .effector_position(0)
            .unwrap()
            .distance(solution.targets()[0]);
        assert_eq!(scored.cost, reach);
    }

    #[test]
    fn continuity_terms_score_against_the_previous_solution() {
        let mut solution = ArmSolution::new(None).unwrap();
        let prev = evaluate(&solution, None);

        // Unchanged configuration adds nothing
        let same = evaluate(&solution, Some(&prev));
        assert!((same.cost - prev.cost).abs() < 1e-12);

        // The drift term is signed: lowering angles subtracts from the cost
        let mut lowered = prev.thetas.clone();
        for theta in lowered.iter_mut().skip(1).take(3) {
            *theta -= 0.2;
        }
        solution.apply_solution(&lowered).unwrap();
        let scored = evaluate(&solution, Some(&prev));

        let reach = solution
            .effector_position(0)
            .unwrap()
            .distance(solution.targets()[0]);
        let n = lowered.len() as f64;
        let drift: f64 = lowered
            .iter()
            .zip(&prev.thetas)
            .map(|(now, before)| now - before)
            .sum::<f64>()
            / n;
        let discontinuity: f64 = solution
            .tree()
            .positions()
            .iter()
            .zip(&prev.positions)
            .map(|(now, before)| now.distance(*before))
            .sum::<f64>()
            / n;
        assert!(drift < 0.0);
        approx::assert_abs_diff_eq!(
            scored.cost,
            reach + drift + 0.5 * discontinuity,
            epsilon = 1e-12
        );
    }

    #[test]
    fn neighbor_changes_one_joint_and_stays_valid() {
        let mut solution = ArmSolution::new(None).unwrap();
        let current = evaluate(&solution, None);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let candidate = neighbor(&mut solution, &current, None, &mut rng).unwrap();
        assert!(solution.solution_is_valid());
        let changed = candidate
            .thetas
            .iter()
            .zip(&current.thetas)
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn frozen_joints_are_never_perturbed() {
        let mut solution = ArmSolution::new(None).unwrap();
        let frozen_id = solution.tree().ids().nth(1).unwrap();
        solution.tree_mut().node_mut(frozen_id).freeze();
        let frozen_theta = solution.tree().node(frozen_id).theta();

        let current = evaluate(&solution, None);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            neighbor(&mut solution, &current, None, &mut rng).unwrap();
            assert_eq!(solution.tree().node(frozen_id).theta(), frozen_theta);
        }
    }
}
