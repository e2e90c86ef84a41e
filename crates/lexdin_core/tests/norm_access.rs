mod common;

use common::{login, seeded_memory_repo, seeded_sqlite_repo};
use lexdin_core::fixtures::load_fixtures;
use lexdin_core::{
    AuthError, IdentityProvider, NormService, NormServiceError, NormView, Role,
};

#[test]
fn anonymous_caller_gets_restricted_view_of_confidential_norm() {
    let service = NormService::new(seeded_sqlite_repo());

    match service.view_norm("norm-conf-001", None, None).unwrap() {
        NormView::Restricted(header) => {
            assert_eq!(header.id, "norm-conf-001");
            assert_eq!(header.title, "Protocolo de Inversiones Estratégicas");
            assert!(header.is_confidential);
        }
        NormView::Visible { .. } => panic!("confidential content leaked to anonymous caller"),
    }
}

#[test]
fn directivo_and_admin_read_confidential_content() {
    let service = NormService::new(seeded_memory_repo());

    for username in ["directivo", "admin"] {
        let user = login(username);
        match service.view_norm("norm-conf-001", Some(&user), None).unwrap() {
            NormView::Visible { selected, .. } => {
                assert_eq!(selected.version, 1);
                assert!(selected.content.contains("Comité Financiero"));
            }
            NormView::Restricted(_) => panic!("{username} should read confidential norms"),
        }
    }
}

#[test]
fn public_norm_is_visible_to_anonymous_callers_with_version_selection() {
    let service = NormService::new(seeded_memory_repo());

    let NormView::Visible { norm, selected } =
        service.view_norm("reg-acad-001", None, Some(1)).unwrap()
    else {
        panic!("public norm must be visible");
    };
    assert_eq!(norm.id, "reg-acad-001");
    assert_eq!(selected.version, 1);

    let err = service.view_norm("reg-acad-001", None, Some(9)).unwrap_err();
    assert!(matches!(
        err,
        NormServiceError::VersionNotFound { version: 9, .. }
    ));
    let err = service.view_norm("no-existe", None, None).unwrap_err();
    assert!(matches!(err, NormServiceError::NormNotFound(_)));
}

#[test]
fn cards_hide_excerpts_of_inaccessible_norms() {
    let service = NormService::new(seeded_memory_repo());

    let cards = service.list_norms(None, "").unwrap();
    assert_eq!(cards.len(), 3);
    let titles: Vec<_> = cards.iter().map(|card| card.title.as_str()).collect();
    let mut sorted = titles.clone();
    sorted.sort();
    assert_eq!(titles, sorted);

    let confidential = cards
        .iter()
        .find(|card| card.id == "norm-conf-001")
        .unwrap();
    assert!(!confidential.accessible);
    assert!(confidential.excerpt.is_none());

    let public = cards.iter().find(|card| card.id == "reg-acad-001").unwrap();
    assert!(public.accessible);
    assert!(public.excerpt.as_deref().unwrap().contains("Reglamento"));

    let directivo = login("directivo");
    let cards = service.list_norms(Some(&directivo), "").unwrap();
    assert!(cards.iter().all(|card| card.accessible && card.excerpt.is_some()));
}

#[test]
fn list_query_matches_title_description_and_tags_case_insensitively() {
    let service = NormService::new(seeded_memory_repo());

    let ids = |query: &str| -> Vec<String> {
        service
            .list_norms(None, query)
            .unwrap()
            .into_iter()
            .map(|card| card.id)
            .collect()
    };
    assert_eq!(ids("INVERSIONES"), vec!["norm-conf-001"]);
    assert_eq!(ids("evaluación"), vec!["reg-acad-001"]);
    assert!(ids("zzz-sin-resultados").is_empty());
}

#[test]
fn fixture_directory_authenticates_known_users_only() {
    let directory = load_fixtures().unwrap().directory();

    let admin = directory.authenticate("admin", "x").unwrap();
    assert_eq!(admin.role(), Role::Admin);
    assert_eq!(
        directory.authenticate("admin", "").unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert_eq!(
        directory.authenticate("intruso", "x").unwrap_err(),
        AuthError::InvalidCredentials
    );
}
