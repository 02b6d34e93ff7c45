//! Report output fan-out.
//!
//! Every buffer is written synchronously to each sink in turn, so there is no
//! intermediate pipe and nothing to stall behind a slow reader. A sink that
//! fails is disabled and its error kept; the remaining sinks keep receiving
//! output.

use std::io::{self, Write};

struct Sink {
    name: String,
    writer: Box<dyn Write>,
    failure: Option<io::Error>,
}

#[derive(Default)]
pub struct Tee {
    sinks: Vec<Sink>,
}

impl Tee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, name: impl Into<String>, writer: impl Write + 'static) -> Self {
        self.push(name, writer);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, writer: impl Write + 'static) {
        self.sinks.push(Sink {
            name: name.into(),
            writer: Box::new(writer),
            failure: None,
        });
    }

    /// Sinks that have failed, with the error that disabled them.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &io::Error)> {
        self.sinks
            .iter()
            .filter_map(|s| s.failure.as_ref().map(|e| (s.name.as_str(), e)))
    }

    fn live_sinks(&self) -> usize {
        self.sinks.iter().filter(|s| s.failure.is_none()).count()
    }

    fn each_live(&mut self, mut op: impl FnMut(&mut dyn Write) -> io::Result<()>) -> io::Result<()> {
        for sink in self.sinks.iter_mut().filter(|s| s.failure.is_none()) {
            if let Err(e) = op(sink.writer.as_mut()) {
                tracing::warn!(sink = %sink.name, "report output disabled: {e}");
                sink.failure = Some(e);
            }
        }

        if !self.sinks.is_empty() && self.live_sinks() == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "every report sink has failed"));
        }
        Ok(())
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.each_live(|w| w.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.each_live(|w| w.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_sink_receives_output() {
        let a = Shared::default();
        let b = Shared::default();
        let mut tee = Tee::new().with_sink("a", a.clone()).with_sink("b", b.clone());

        write!(tee, "hello {}", 42).unwrap();
        tee.flush().unwrap();

        assert_eq!(a.0.borrow().as_slice(), b"hello 42");
        assert_eq!(b.0.borrow().as_slice(), b"hello 42");
    }

    #[test]
    fn failing_sink_is_isolated_and_reported() {
        let good = Shared::default();
        let mut tee = Tee::new().with_sink("report file", Broken).with_sink("stdout", good.clone());

        writeln!(tee, "first").unwrap();
        writeln!(tee, "second").unwrap();

        assert_eq!(good.0.borrow().as_slice(), b"first\nsecond\n");
        let failures: Vec<_> = tee.failures().map(|(name, e)| (name.to_string(), e.to_string())).collect();
        assert_eq!(failures, vec![("report file".to_string(), "disk full".to_string())]);
    }

    #[test]
    fn all_sinks_failing_is_an_error() {
        let mut tee = Tee::new().with_sink("only", Broken);
        assert!(tee.write_all(b"x").is_err());
    }

    #[test]
    fn empty_tee_discards() {
        let mut tee = Tee::new();
        assert!(tee.write_all(b"x").is_ok());
    }
}
