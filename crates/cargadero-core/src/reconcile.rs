use cargadero_sheet::Sheet;
use similar::TextDiff;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Symmetric character-level similarity ratio in `[0, 1]`, derived from the
/// longest matching subsequences between the two strings.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    TextDiff::from_chars(a, b).ratio() as f64
}

/// Finds the first header whose similarity to `target` reaches `threshold`,
/// scanning in column order. Upload sheets routinely arrive with mangled
/// header variants ("Citas", "Cita prog."), so an exact lookup is not enough.
/// No match is not an error: the caller treats the column as absent.
pub fn find_similar_column<'a>(
    headers: &'a [String],
    target: &str,
    threshold: f64,
) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| similarity_ratio(target, header) >= threshold)
        .map(|header| header.as_str())
}

/// Renames the closest matching header to the canonical `target` name so the
/// rest of the pipeline can address it directly. Returns the original header
/// name when a rename happened.
pub fn reconcile_column(sheet: &mut Sheet, target: &str, threshold: f64) -> Option<String> {
    let matched = find_similar_column(sheet.headers(), target, threshold)?.to_string();
    if matched != target {
        sheet.rename_header(&matched, target);
    }
    Some(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargadero_sheet::parse_sheet;

    #[test]
    fn close_variants_match_at_default_threshold() {
        let headers = vec!["Fecha".to_string(), "Citas".to_string()];
        assert_eq!(
            find_similar_column(&headers, "Cita", DEFAULT_SIMILARITY_THRESHOLD),
            Some("Citas")
        );
    }

    #[test]
    fn identical_header_scores_one() {
        assert!((similarity_ratio("Cita", "Cita") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disjoint_header_does_not_match() {
        let headers = vec!["XYZW".to_string()];
        assert_eq!(
            find_similar_column(&headers, "Cita", DEFAULT_SIMILARITY_THRESHOLD),
            None
        );
        assert_eq!(similarity_ratio("Cita", "xyzw"), 0.0);
    }

    #[test]
    fn first_qualifying_header_wins() {
        let headers = vec![
            "Cital".to_string(),
            "Cita".to_string(),
            "Citas".to_string(),
        ];
        assert_eq!(
            find_similar_column(&headers, "Cita", DEFAULT_SIMILARITY_THRESHOLD),
            Some("Cital")
        );
    }

    #[test]
    fn reconcile_renames_matched_header() {
        let csv = "Fecha,Citas prog.\n01/08/2026,4\n";
        let mut sheet = parse_sheet(csv.as_bytes()).expect("parse");
        // "Citas prog." vs "Cita" scores below 0.75; use a looser threshold.
        let original = reconcile_column(&mut sheet, "Cita", 0.5);
        assert_eq!(original.as_deref(), Some("Citas prog."));
        assert!(sheet.column_index("Cita").is_some());
    }

    #[test]
    fn absent_column_is_not_an_error() {
        let csv = "Fecha,Placa\n01/08/2026,AAA-111\n";
        let mut sheet = parse_sheet(csv.as_bytes()).expect("parse");
        assert_eq!(
            reconcile_column(&mut sheet, "Cita", DEFAULT_SIMILARITY_THRESHOLD),
            None
        );
    }
}
