use gradesync_core::names::normalize::CanonicalName;
use gradesync_core::{find_best_match, find_best_row, normalize_name, CellValue, MatchPolicy};

#[test]
fn normalization_is_idempotent() {
    let samples = [
        "García López, Ana",
        "  PÉREZ   de la Cruz, José  ",
        "María José Ñúñez",
        "İlkay Gündoğan",
        "Zoë O'Brien-Smith",
        "",
        ",,,",
        "de la y",
    ];
    for raw in samples {
        let once = normalize_name(raw);
        assert_eq!(normalize_name(&once), once, "input: {raw:?}");
    }
}

#[test]
fn normalization_strips_accents_commas_and_stop_words() {
    assert_eq!(normalize_name("García López, Ana"), "garcia lopez ana");
    assert_eq!(normalize_name("María de los Ángeles Ruiz"), "angeles ruiz");
    assert_eq!(normalize_name(""), "");
}

#[test]
fn non_text_inputs_are_empty_names() {
    assert!(CanonicalName::from_optional(None).is_empty());
    assert!(CanonicalName::from_cell(&CellValue::Number(8.0)).is_empty());
    assert!(CanonicalName::from_cell(&CellValue::Empty).is_empty());
}

#[test]
fn identical_name_matches_its_row() {
    let policy = MatchPolicy::default();
    let name = "Juan Pérez Ruiz";
    assert_eq!(find_best_row(name, [(1, Some(name))], &policy), Some(1));
}

#[test]
fn disjoint_names_do_not_match() {
    let policy = MatchPolicy::default();
    let candidates = [(10, Some("Luis Gómez")), (11, Some("Marta Sanz"))];
    assert_eq!(find_best_row("Ana García", candidates, &policy), None);
}

#[test]
fn ties_resolve_to_the_lowest_row() {
    let policy = MatchPolicy::default();
    let candidates = [
        (10, Some("Ana García Soto")),
        (11, Some("Ana García Vidal")),
    ];
    let result = find_best_match("García, Ana", candidates, &policy);
    assert_eq!(result.row, Some(10));
    assert_eq!(result.matched_name.as_deref(), Some("Ana García Soto"));
    assert_eq!(result.score, 2);
}

#[test]
fn blank_and_missing_candidates_are_skipped() {
    let policy = MatchPolicy::default();
    let candidates = [
        (10, None),
        (11, Some("   ")),
        (12, Some("Ana García")),
    ];
    assert_eq!(find_best_row("Ana García", candidates, &policy), Some(12));
}

#[test]
fn blank_target_never_matches() {
    let policy = MatchPolicy::default();
    let result = find_best_match("  ", [(10, Some("Ana"))], &policy);
    assert!(!result.is_match());
    assert_eq!(result.score, 0);
}

#[test]
fn short_names_match_on_a_single_token() {
    let policy = MatchPolicy::default();
    assert_eq!(find_best_row("Ana Soto", [(3, Some("Ana Ruiz"))], &policy), Some(3));
    // A long candidate disables the short-name relaxation.
    assert_eq!(
        find_best_row("Ana Soto", [(3, Some("Ana Ruiz Vidal"))], &policy),
        None
    );
}

#[test]
fn stricter_policy_rejects_short_name_guesses() {
    let strict = MatchPolicy {
        short_name_max_tokens: 0,
        ..MatchPolicy::default()
    };
    assert_eq!(find_best_row("Ana Soto", [(3, Some("Ana Ruiz"))], &strict), None);
    assert_eq!(find_best_row("Ana Soto", [(3, Some("Soto, Ana"))], &strict), Some(3));
}

#[test]
fn maria_does_not_count_towards_overlap() {
    let policy = MatchPolicy::default();
    let candidates = [(5, Some("María Ruiz Vidal"))];
    assert_eq!(find_best_row("María Ruiz Soto", candidates, &policy), Some(5));
    let candidates = [(5, Some("María Luisa Vidal"))];
    assert_eq!(find_best_row("María Ruiz Soto", candidates, &policy), None);
}
