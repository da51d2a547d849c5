//! Policy table: per-state action scores learned by Q-learning

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    game::{ACTION_COUNT, Action, GameState, STATE_COUNT, optimal_take},
};

/// One row of scores, indexed by [`Action::index`]
pub type Row = [f64; ACTION_COUNT];

/// Step size and discount used by the TD update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TdParams {
    /// Learning rate α
    pub learning_rate: f64,
    /// Discount factor γ
    pub discount_factor: f64,
}

impl Default for TdParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            discount_factor: 0.9,
        }
    }
}

/// Fixed-size table mapping each pile size to a score per action.
///
/// Always holds exactly `STATE_COUNT` rows. Row 0 (empty pile) is never
/// consulted but kept so rows index directly by stone count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    rows: [Row; STATE_COUNT],
}

impl PolicyTable {
    /// All-zero table
    pub fn new() -> Self {
        Self {
            rows: [[0.0; ACTION_COUNT]; STATE_COUNT],
        }
    }

    /// Table that prefers the optimal take in every state.
    ///
    /// Used when no trained table is available so the agent still plays
    /// sensibly.
    pub fn heuristic() -> Self {
        let mut table = Self::new();
        for stones in 1..STATE_COUNT as u8 {
            let state = GameState::at(stones).unwrap_or_default();
            if let Some(best) = optimal_take(state) {
                table.rows[state.index()][best.index()] = 1.0;
            }
        }
        table
    }

    pub fn from_rows(rows: &[Row]) -> Result<Self> {
        if rows.len() != STATE_COUNT {
            return Err(Error::InvalidTable {
                message: format!("expected {STATE_COUNT} rows, got {}", rows.len()),
            });
        }
        let mut table = Self::new();
        table.rows.copy_from_slice(rows);
        table.validate()?;
        Ok(table)
    }

    /// Build from a flat row-major list of `STATE_COUNT * ACTION_COUNT` scores
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != STATE_COUNT * ACTION_COUNT {
            return Err(Error::InvalidTable {
                message: format!(
                    "expected {} values, got {}",
                    STATE_COUNT * ACTION_COUNT,
                    values.len()
                ),
            });
        }
        let rows: Vec<Row> = values
            .chunks_exact(ACTION_COUNT)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect();
        Self::from_rows(&rows)
    }

    /// Reject NaN and infinite scores
    pub fn validate(&self) -> Result<()> {
        for (stones, row) in self.rows.iter().enumerate() {
            if let Some(bad) = row.iter().find(|v| !v.is_finite()) {
                return Err(Error::InvalidTable {
                    message: format!("non-finite score {bad} in row {stones}"),
                });
            }
        }
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, state: GameState) -> &Row {
        &self.rows[state.index()]
    }

    /// Row-major scores, as sent on the wire
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().flat_map(|row| row.iter().copied())
    }

    pub fn get(&self, state: GameState, action: Action) -> f64 {
        self.rows[state.index()][action.index()]
    }

    pub fn set(&mut self, state: GameState, action: Action, value: f64) {
        self.rows[state.index()][action.index()] = value;
    }

    /// Maximum score over legal actions, 0 for the empty pile
    pub fn max_q(&self, state: GameState) -> f64 {
        state
            .legal_actions()
            .map(|action| self.get(state, action))
            .fold(None, |best: Option<f64>, q| {
                Some(best.map_or(q, |b| b.max(q)))
            })
            .unwrap_or(0.0)
    }

    /// Highest-scoring legal action, ties broken by lowest action index
    pub fn greedy_action(&self, state: GameState) -> Option<Action> {
        let mut best: Option<(Action, f64)> = None;
        for action in state.legal_actions() {
            let q = self.get(state, action);
            match best {
                Some((_, best_q)) if q <= best_q => {}
                _ => best = Some((action, q)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Q-learning update: off-policy TD control
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// Past a terminal state the continuation value is zero. Returns the
    /// absolute change applied to Q(s,a).
    pub fn q_learning_update(
        &mut self,
        state: GameState,
        action: Action,
        reward: f64,
        next_state: GameState,
        done: bool,
        params: TdParams,
    ) -> f64 {
        let current_q = self.get(state, action);
        let max_next_q = if done || next_state.is_terminal() {
            0.0
        } else {
            self.max_q(next_state)
        };
        let td_target = reward + params.discount_factor * max_next_q;
        let td_error = td_target - current_q;
        let new_q = current_q + params.learning_rate * td_error;
        self.set(state, action, new_q);
        (new_q - current_q).abs()
    }

    /// Largest absolute difference between corresponding entries
    pub fn max_abs_diff(&self, other: &PolicyTable) -> f64 {
        self.values()
            .zip(other.values())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    pub fn approx_eq(&self, other: &PolicyTable, tolerance: f64) -> bool {
        self.max_abs_diff(other) <= tolerance
    }

    /// Human-readable dump, one row per line with three decimals
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| format!("{v:.3}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(stones: u8) -> GameState {
        GameState::at(stones).unwrap()
    }

    #[test]
    fn test_table_initialization() {
        let table = PolicyTable::new();
        assert_eq!(table.rows().len(), STATE_COUNT);
        assert_eq!(table.get(state(21), Action::Take3), 0.0);
    }

    #[test]
    fn test_table_set_get() {
        let mut table = PolicyTable::new();
        table.set(state(7), Action::Take2, 1.5);
        assert_eq!(table.get(state(7), Action::Take2), 1.5);
    }

    #[test]
    fn test_max_q_ignores_illegal_actions() {
        let mut table = PolicyTable::new();
        table.set(state(1), Action::Take1, -0.5);
        table.set(state(1), Action::Take3, 9.0);
        assert_eq!(table.max_q(state(1)), -0.5);
        assert_eq!(table.max_q(state(0)), 0.0);
    }

    #[test]
    fn test_greedy_action_prefers_highest_legal() {
        let mut table = PolicyTable::new();
        table.set(state(9), Action::Take1, 0.5);
        table.set(state(9), Action::Take2, 1.5);
        table.set(state(9), Action::Take3, 0.8);
        assert_eq!(table.greedy_action(state(9)), Some(Action::Take2));

        table.set(state(2), Action::Take3, 5.0);
        assert_eq!(table.greedy_action(state(2)), Some(Action::Take1));
        assert_eq!(table.greedy_action(state(0)), None);
    }

    #[test]
    fn test_greedy_ties_break_to_lowest_index() {
        let mut table = PolicyTable::new();
        table.set(state(12), Action::Take2, 0.7);
        table.set(state(12), Action::Take3, 0.7);
        assert_eq!(table.greedy_action(state(12)), Some(Action::Take2));
        assert_eq!(PolicyTable::new().greedy_action(state(12)), Some(Action::Take1));
    }

    #[test]
    fn test_q_learning_update() {
        let mut table = PolicyTable::new();
        table.set(state(16), Action::Take1, 1.0);
        table.set(state(16), Action::Take2, 2.0);

        let params = TdParams {
            learning_rate: 0.5,
            discount_factor: 0.99,
        };
        let delta = table.q_learning_update(state(21), Action::Take3, 0.0, state(16), false, params);

        // Q(s,a) = 0.0 + 0.5 * (0.0 + 0.99 * 2.0 - 0.0) = 0.99
        assert!((table.get(state(21), Action::Take3) - 0.99).abs() < 1e-9);
        assert!((delta - 0.99).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_update_has_no_continuation() {
        let mut table = PolicyTable::new();
        table.set(state(0), Action::Take1, 100.0);
        let params = TdParams::default();
        table.q_learning_update(state(3), Action::Take3, 1.0, state(0), true, params);
        assert!((table.get(state(3), Action::Take3) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_values_checks_shape_and_finiteness() {
        assert!(PolicyTable::from_values(&[0.0; 65]).is_err());
        let mut values = vec![0.25; 66];
        assert!(PolicyTable::from_values(&values).is_ok());
        values[10] = f64::NAN;
        assert!(matches!(
            PolicyTable::from_values(&values),
            Err(Error::InvalidTable { .. })
        ));
    }

    #[test]
    fn test_heuristic_prefers_optimal_take() {
        let table = PolicyTable::heuristic();
        for stones in 1..=21 {
            let s = state(stones);
            assert_eq!(table.greedy_action(s), optimal_take(s));
        }
    }

    #[test]
    fn test_text_dump_has_one_line_per_state() {
        let text = PolicyTable::heuristic().to_text();
        assert_eq!(text.lines().count(), STATE_COUNT);
        assert_eq!(text.lines().nth(1), Some("1.000 0.000 0.000"));
    }
}
