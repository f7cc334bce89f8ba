//! Metropolis-Hastings acceptance criterion
//!
//! A proposal is accepted if it is cheaper, or with probability
//! `exp(-(proposal - current) * beta)` when it is worse. Higher beta is
//! greedier; lower beta explores more.

use rand::Rng;

pub struct AcceptanceCriterion {
    beta: f64,
}

impl AcceptanceCriterion {
    pub fn new(beta: f64) -> Self {
        assert!(beta > 0.0, "beta must be positive");
        Self { beta }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Probability of accepting a proposal given the cost difference
    /// (positive delta = worse proposal).
    pub fn acceptance_probability(&self, cost_delta: i64) -> f64 {
        if cost_delta <= 0 {
            1.0
        } else {
            (-(cost_delta as f64) * self.beta).exp()
        }
    }

    pub fn accept<R: Rng>(&self, rng: &mut R, current_cost: u64, proposal_cost: u64) -> bool {
        if proposal_cost <= current_cost {
            return true;
        }
        let delta = (proposal_cost - current_cost) as i64;
        rng.random::<f64>() < self.acceptance_probability(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_improvements_always_accepted() {
        let criterion = AcceptanceCriterion::new(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            assert!(criterion.accept(&mut rng, 10, 5));
            assert!(criterion.accept(&mut rng, 10, 10));
        }
    }

    #[test]
    fn test_probability_decays_with_delta() {
        let criterion = AcceptanceCriterion::new(1.0);
        let p1 = criterion.acceptance_probability(1);
        let p5 = criterion.acceptance_probability(5);
        assert!(p1 > p5);
        assert!((p1 - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_higher_beta_is_greedier() {
        let cool = AcceptanceCriterion::new(4.0);
        let hot = AcceptanceCriterion::new(0.5);
        assert!(cool.acceptance_probability(3) < hot.acceptance_probability(3));
    }

    #[test]
    fn test_worse_proposals_sometimes_rejected() {
        let criterion = AcceptanceCriterion::new(2.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let accepted = (0..1000)
            .filter(|_| criterion.accept(&mut rng, 10, 14))
            .count();
        assert!(accepted > 0);
        assert!(accepted < 1000);
    }
}
