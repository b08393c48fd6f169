//! Preview signatures
//!
//! A signature is the hex SHA-256 of the preview's JSON form (an array of
//! string arrays). It is only ever used as a mapping cache key.

use sha2::{Digest, Sha256};

use crate::models::{Preview, Signature};

/// Compute the signature for a preview
pub fn signature_for(preview: &Preview) -> Signature {
    // Serializing nested string vectors cannot fail
    let json = serde_json::to_vec(preview.rows()).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Signature::new(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grid;

    fn preview(rows: Vec<Vec<&str>>) -> Preview {
        Grid::from(rows).preview(5)
    }

    #[test]
    fn test_identical_previews_match() {
        let a = preview(vec![vec!["Date", "Bill", "Amount"], vec!["1/1", "B1", "100"]]);
        let b = preview(vec![vec!["Date", "Bill", "Amount"], vec!["1/1", "B1", "100"]]);
        assert_eq!(signature_for(&a), signature_for(&b));
    }

    #[test]
    fn test_signature_is_order_sensitive() {
        let a = preview(vec![vec!["Date", "Amount"], vec!["1/1", "100"]]);
        let b = preview(vec![vec!["1/1", "100"], vec!["Date", "Amount"]]);
        let c = preview(vec![vec!["Amount", "Date"], vec!["100", "1/1"]]);
        assert_ne!(signature_for(&a), signature_for(&b));
        assert_ne!(signature_for(&a), signature_for(&c));
    }

    #[test]
    fn test_cell_boundaries_matter() {
        let a = preview(vec![vec!["ab", "c"]]);
        let b = preview(vec![vec!["a", "bc"]]);
        assert_ne!(signature_for(&a), signature_for(&b));
    }

    #[test]
    fn test_empty_preview_has_signature() {
        let sig = signature_for(&Preview::default());
        assert_eq!(sig.as_str().len(), 64);
        // sha256("[]")
        assert_eq!(
            sig.as_str(),
            "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
        );
    }

    #[test]
    fn test_only_preview_rows_count() {
        let a = Grid::from(vec![
            vec!["h"],
            vec!["1"],
            vec!["2"],
            vec!["3"],
            vec!["4"],
            vec!["tail a"],
        ]);
        let b = Grid::from(vec![
            vec!["h"],
            vec!["1"],
            vec!["2"],
            vec!["3"],
            vec!["4"],
            vec!["tail b"],
        ]);
        assert_eq!(signature_for(&a.preview(5)), signature_for(&b.preview(5)));
    }
}
