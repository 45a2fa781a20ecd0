use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        GifGenError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(GifGenError::decode("x").to_string().contains("decode error:"));
    assert!(GifGenError::encode("x").to_string().contains("encode error:"));
    assert!(
        GifGenError::acquisition("x")
            .to_string()
            .contains("acquisition error:")
    );
}

#[test]
fn conflict_names_the_destination() {
    let err = GifGenError::Conflict(PathBuf::from("cache/anim.gif"));
    let msg = err.to_string();
    assert!(msg.contains("anim.gif"));
    assert!(msg.contains("already exists"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = GifGenError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
