//! Round-robin selection over healthy instances.

use crate::discovery::ServiceInstance;
use crate::load_balancer::types::{Selection, SelectionError, SelectionResult};

/// Pick `healthy[cursor % N]` and return the advanced cursor.
///
/// Only instances whose every check passes are eligible. The cursor is owned
/// by the caller; the returned `next_cursor` is always in `[0, N)`.
pub fn round_robin_selection(
    instances: &[ServiceInstance],
    cursor: usize,
) -> SelectionResult<Selection<&ServiceInstance>> {
    let healthy: Vec<&ServiceInstance> = instances.iter().filter(|i| i.is_healthy()).collect();
    if healthy.is_empty() {
        return Err(SelectionError::NoHealthyInstances);
    }

    let len = healthy.len();
    let index = cursor % len;
    Ok(Selection {
        selected: healthy[index],
        next_cursor: (index + 1) % len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{CheckStatus, HealthCheck};

    fn instance(id: &str, status: CheckStatus) -> ServiceInstance {
        ServiceInstance {
            id: id.to_string(),
            address: "127.0.0.1".to_string(),
            port: 8080,
            tags: Vec::new(),
            checks: vec![HealthCheck::new(status, "")],
        }
    }

    #[test]
    fn test_round_robin() {
        let instances = vec![
            instance("b1", CheckStatus::Passing),
            instance("b2", CheckStatus::Passing),
        ];

        let s1 = round_robin_selection(&instances, 0).unwrap();
        assert_eq!(s1.selected.id, "b1");

        let s2 = round_robin_selection(&instances, s1.next_cursor).unwrap();
        assert_eq!(s2.selected.id, "b2");

        let s3 = round_robin_selection(&instances, s2.next_cursor).unwrap();
        assert_eq!(s3.selected.id, "b1");
    }

    #[test]
    fn test_round_robin_visits_each_once() {
        let instances: Vec<_> = (0..5)
            .map(|i| instance(&format!("b{i}"), CheckStatus::Passing))
            .collect();

        let mut cursor = 0;
        let mut seen = Vec::new();
        for _ in 0..instances.len() {
            let selection = round_robin_selection(&instances, cursor).unwrap();
            assert!(selection.next_cursor < instances.len());
            seen.push(selection.selected.id.clone());
            cursor = selection.next_cursor;
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), instances.len());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_skips_unhealthy_and_wraps_stale_cursor() {
        let instances = vec![
            instance("b1", CheckStatus::Passing),
            instance("b2", CheckStatus::Critical),
            instance("b3", CheckStatus::Passing),
        ];

        // Cursor left over from a larger pool still lands in range.
        let selection = round_robin_selection(&instances, 7).unwrap();
        assert_eq!(selection.selected.id, "b3");
        assert_eq!(selection.next_cursor, 0);
    }

    #[test]
    fn test_all_unhealthy() {
        let instances = vec![
            instance("b1", CheckStatus::Critical),
            instance("b2", CheckStatus::Warning),
        ];
        assert_eq!(
            round_robin_selection(&instances, 0).unwrap_err(),
            SelectionError::NoHealthyInstances
        );
        assert_eq!(
            round_robin_selection(&[], 0).unwrap_err(),
            SelectionError::NoHealthyInstances
        );
    }
}
