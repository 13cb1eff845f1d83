use super::cluster::QueryCluster;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One repeated query shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateQuery {
    pub count: u64,
    pub example: String,
}

impl From<&QueryCluster> for DuplicateQuery {
    fn from(cluster: &QueryCluster) -> Self {
        Self {
            count: cluster.count,
            example: cluster.example.clone(),
        }
    }
}

/// Render `"<N> queries: <example>\n"` per entry
pub fn render(duplicates: &[DuplicateQuery]) -> String {
    let mut report = String::new();
    for duplicate in duplicates {
        let _ = writeln!(report, "{} queries: {}", duplicate.count, duplicate.example);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lines() {
        let duplicates = vec![
            DuplicateQuery { count: 5, example: "SELECT * FROM users WHERE id = 1".to_string() },
            DuplicateQuery { count: 2, example: "SELECT * FROM posts".to_string() },
        ];
        assert_eq!(
            render(&duplicates),
            "5 queries: SELECT * FROM users WHERE id = 1\n2 queries: SELECT * FROM posts\n"
        );
        assert_eq!(render(&[]), "");
    }
}
