use std::path::PathBuf;

/// Returns a new, not yet existing, directory path under the system temporary directory. Every call returns a
/// different path.
pub fn tmp_dir_path() -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    const PREFIX: &str = "mkimages-";
    const LEN: usize = 16;

    let mut name = String::with_capacity(PREFIX.len() + LEN);
    name.push_str(PREFIX);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut name, LEN);
    std::env::temp_dir().join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_fresh() {
        let a = tmp_dir_path();
        let b = tmp_dir_path();
        assert_ne!(a, b);
        assert!(a.starts_with(std::env::temp_dir()));
        assert!(a
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("mkimages-")));
    }
}
