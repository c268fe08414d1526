use cloudbox_core::auth::TokenBundle;
use cloudbox_core::credentials::{
    CredentialBackend, CredentialRecord, FallbackBackend, MemoryBackend, YamlFileBackend,
};
use tempfile::TempDir;

fn oauth_record(access: &str) -> CredentialRecord {
    CredentialRecord::with_token(TokenBundle {
        access_token: access.into(),
        refresh_token: Some(format!("{access}-refresh")),
        expires_at: Some(1_800_000_000),
    })
}

#[test]
fn yaml_store_round_trips_per_profile() {
    let dir = TempDir::new().unwrap();
    let backend = YamlFileBackend::new(dir.path().join("credentials.yaml"));

    let work = CredentialRecord {
        api_key: Some("cb_work_key".into()),
        oauth_token: None,
    };
    let personal = oauth_record("personal-token");

    backend.store("work", &work).unwrap();
    backend.store("personal", &personal).unwrap();

    assert_eq!(backend.load("work").unwrap(), Some(work.clone()));
    assert_eq!(backend.load("personal").unwrap(), Some(personal));
    assert_eq!(backend.load("default").unwrap(), None);

    backend.delete("personal").unwrap();
    assert_eq!(backend.load("personal").unwrap(), None);
    assert_eq!(backend.load("work").unwrap(), Some(work));
}

#[test]
fn yaml_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.yaml");

    YamlFileBackend::new(&path)
        .store("default", &oauth_record("tok"))
        .unwrap();

    let reopened = YamlFileBackend::new(&path);
    let record = reopened.load("default").unwrap().unwrap();
    assert_eq!(record.oauth_token.unwrap().access_token, "tok");
}

#[test]
fn fallback_reads_from_first_backend_with_a_record() {
    let dir = TempDir::new().unwrap();
    let file = YamlFileBackend::new(dir.path().join("credentials.yaml"));
    file.store("default", &oauth_record("from-file")).unwrap();

    let chain = FallbackBackend::new(vec![Box::new(MemoryBackend::new()), Box::new(file)]);
    let record = chain.load("default").unwrap().unwrap();
    assert_eq!(record.oauth_token.unwrap().access_token, "from-file");
    assert_eq!(chain.backend_names(), vec!["memory", "credentials file"]);
}

#[test]
fn fallback_stores_in_first_backend_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.yaml");
    let chain = FallbackBackend::new(vec![
        Box::new(MemoryBackend::new()),
        Box::new(YamlFileBackend::new(&path)),
    ]);

    chain
        .store("default", &CredentialRecord::with_api_key("k"))
        .unwrap();
    assert!(!path.exists());
    assert!(chain.load("default").unwrap().is_some());

    chain.delete("default").unwrap();
    assert!(chain.load("default").unwrap().is_none());
}
