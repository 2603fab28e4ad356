use crate::types::Span;

/// Resolves an absolute byte offset to a 1-based line number.
pub trait LineResolver {
    fn line(&self, pos: usize) -> usize;
}

/// Line start offsets of one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTable {
    starts: Vec<usize>,
}

impl LineTable {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

impl LineResolver for LineTable {
    fn line(&self, pos: usize) -> usize {
        // Number of line starts at or before `pos`; always >= 1 because starts[0] == 0.
        self.starts.partition_point(|&start| start <= pos)
    }
}

/// Lines covered by `span`, counting both boundary lines.
pub fn line_span<R: LineResolver + ?Sized>(resolver: &R, span: Span) -> usize {
    let start = resolver.line(span.start);
    let end = resolver.line(span.end);
    end.saturating_sub(start) + 1
}
