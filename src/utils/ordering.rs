/// Next position at the end of an ordering scope (a project for lanes, a
/// lane for tasks). An empty scope starts at 0; otherwise one past the
/// current maximum. The caller inserts with this value in the same request;
/// there is no uniqueness constraint, so concurrent creates in one scope may
/// end up sharing a position.
pub fn next_order(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(-1) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_starts_at_zero() {
        assert_eq!(next_order(None), 0);
    }

    #[test]
    fn appends_after_current_max() {
        assert_eq!(next_order(Some(0)), 1);
        assert_eq!(next_order(Some(2)), 3);
        assert_eq!(next_order(Some(41)), 42);
    }

    #[test]
    fn tolerates_negative_positions() {
        // Positions are never assigned negative, but a manual reorder could
        // write one; the next append still lands past it.
        assert_eq!(next_order(Some(-3)), -2);
    }
}
