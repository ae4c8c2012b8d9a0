// SPDX-License-Identifier: MIT

//! SQL extraction from model output

const OPEN_FENCE: &str = "```sql";
const CLOSE_FENCE: &str = "```";

/// Text between the first "```sql" fence and the next closing fence, trimmed.
///
/// Returns `None` when the opening fence, the closing fence, or any
/// non-whitespace content between them is missing.
pub fn extract_sql(content: &str) -> Option<&str> {
    let start = content.find(OPEN_FENCE)? + OPEN_FENCE.len();
    let rest = &content[start..];
    let end = rest.find(CLOSE_FENCE)?;
    let sql = rest[..end].trim();
    (!sql.is_empty()).then_some(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fenced_block() {
        let content = "Here you go:\n```sql\nSELECT 1;\n```\nDone.";
        assert_eq!(extract_sql(content), Some("SELECT 1;"));
    }

    #[test]
    fn test_first_block_wins() {
        let content = "```sql\nSELECT 1;\n```\nor\n```sql\nSELECT 2;\n```";
        assert_eq!(extract_sql(content), Some("SELECT 1;"));
    }

    #[test]
    fn test_multiline_query_kept_intact() {
        let content = "```sql\nSELECT name\nFROM customers\nORDER BY revenue DESC\nLIMIT 5;\n```";
        assert_eq!(
            extract_sql(content),
            Some("SELECT name\nFROM customers\nORDER BY revenue DESC\nLIMIT 5;")
        );
    }

    #[test]
    fn test_no_fence_fails() {
        assert_eq!(extract_sql("SELECT 1;"), None);
    }

    #[test]
    fn test_untagged_fence_fails() {
        assert_eq!(extract_sql("```\nSELECT 1;\n```"), None);
    }

    #[test]
    fn test_unclosed_fence_fails() {
        assert_eq!(extract_sql("```sql\nSELECT 1;"), None);
    }

    #[test]
    fn test_empty_block_fails() {
        assert_eq!(extract_sql("```sql\n   \n```"), None);
    }
}
