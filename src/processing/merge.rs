//! Recombine per-chunk outputs into one text.

/// Separator placed between surviving chunk outputs.
pub const MERGE_SEPARATOR: &str = "\n\n";

/// Trim each output, drop the ones left empty, and join the rest with a blank line.
///
/// Input order is kept; callers supply outputs in document order. An empty or failed chunk
/// output is omitted rather than aborting the merge.
pub fn merge<I, S>(outputs: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut merged = String::new();
    for output in outputs {
        let trimmed = output.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if !merged.is_empty() {
            merged.push_str(MERGE_SEPARATOR);
        }
        merged.push_str(trimmed);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_of_nothing_is_empty() {
        assert_eq!(merge(Vec::<String>::new()), "");
    }

    #[test]
    fn merge_skips_blank_outputs() {
        assert_eq!(merge(["  ", "a", "", "b"]), "a\n\nb");
    }

    #[test]
    fn merge_trims_and_preserves_order() {
        let outputs = vec![" third \n".to_string(), "first".into(), "\tsecond".into()];
        assert_eq!(merge(&outputs), "third\n\nfirst\n\nsecond");
    }
}
