use std::path::Path;

use super::Backend;
use crate::{process::CommandLine, Result};

/// Forwards every call to each backend in order, stopping at the first error.
pub struct CompositeBackend<'a> {
    backends: Vec<Box<dyn Backend + 'a>>,
}

impl<'a> CompositeBackend<'a> {
    pub fn new(backends: Vec<Box<dyn Backend + 'a>>) -> Self {
        Self { backends }
    }
}

impl Backend for CompositeBackend<'_> {
    fn create_dir(&self, path: &Path) -> Result<()> {
        self.backends
            .iter()
            .try_for_each(|backend| backend.create_dir(path))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.backends
            .iter()
            .try_for_each(|backend| backend.write_file(path, content))
    }

    fn run(&self, command: &CommandLine) -> Result<()> {
        self.backends
            .iter()
            .try_for_each(|backend| backend.run(command))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::testing::{Action, RecordingBackend};

    struct Shared(Rc<RecordingBackend>);

    impl Backend for Shared {
        fn create_dir(&self, path: &Path) -> Result<()> {
            self.0.create_dir(path)
        }

        fn write_file(&self, path: &Path, content: &str) -> Result<()> {
            self.0.write_file(path, content)
        }

        fn run(&self, command: &CommandLine) -> Result<()> {
            self.0.run(command)
        }
    }

    #[test]
    fn forwards_in_order_and_stops_at_the_first_error() {
        let first = Rc::new(RecordingBackend::failing_on("docker push"));
        let second = Rc::new(RecordingBackend::default());
        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(Shared(first.clone())),
            Box::new(Shared(second.clone())),
        ];
        let composite = CompositeBackend::new(backends);

        composite.create_dir(Path::new("/tmp/x")).unwrap();
        composite
            .run(&CommandLine::new("docker").args(["tag", "a:1", "a:2"]))
            .unwrap();
        assert!(composite
            .run(&CommandLine::new("docker").args(["push", "a:2"]))
            .is_err());

        assert_eq!(
            first.actions(),
            vec![
                Action::CreateDir("/tmp/x".into()),
                Action::Run("docker tag a:1 a:2".to_owned()),
                Action::Run("docker push a:2".to_owned()),
            ]
        );
        assert_eq!(
            second.actions(),
            vec![
                Action::CreateDir("/tmp/x".into()),
                Action::Run("docker tag a:1 a:2".to_owned()),
            ]
        );
    }
}
