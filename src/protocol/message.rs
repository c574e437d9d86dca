//! Problem and answer messages exchanged over a worker's pipes.

/// Encoded length of a problem header:
/// `size:u64 | id:u32 | kind:u16 | variants:u16 | variant:u16 | reserved:u16`.
pub const PROBLEM_HEADER_LEN: usize = 20;

/// Encoded length of an answer header:
/// `size:u64 | id:u32 | failed:u8 | reserved:[u8; 3]`.
pub const ANSWER_HEADER_LEN: usize = 16;

/// Solver families known to the built-in registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ProblemKind {
    /// Scripted behaviour driven by an opcode in the payload.
    Script = 0,
    /// Proof-of-work nonce search.
    Miner = 1,
}

impl ProblemKind {
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for ProblemKind {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ProblemKind::Script),
            1 => Ok(ProblemKind::Miner),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemKind::Script => write!(f, "script"),
            ProblemKind::Miner => write!(f, "miner"),
        }
    }
}

/// One concrete problem variant handed to a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Unique within a run.
    pub id: u32,
    /// Raw kind code; unknown codes survive decoding so the worker can refuse them.
    pub kind: u16,
    /// Number of variants the generator was asked to spread the problem over.
    pub variants: u16,
    /// Index of this variant within the round.
    pub variant: u16,
    pub payload: Vec<u8>,
}

impl Problem {
    pub fn new(id: u32, kind: ProblemKind, payload: Vec<u8>) -> Self {
        Self {
            id,
            kind: kind.code(),
            variants: 1,
            variant: 0,
            payload,
        }
    }

    /// Tag this problem as variant `variant` of `variants`.
    pub fn with_variant(mut self, variants: u16, variant: u16) -> Self {
        self.variants = variants.max(1);
        self.variant = variant;
        self
    }

    pub fn problem_kind(&self) -> Option<ProblemKind> {
        ProblemKind::try_from(self.kind).ok()
    }

    /// Total encoded length, header included.
    pub fn size(&self) -> u64 {
        (PROBLEM_HEADER_LEN + self.payload.len()) as u64
    }
}

/// A worker's response to a problem: a claimed solution, or a failure notice.
///
/// Solver failure and cancellation share `failed = true` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Echoes the problem id.
    pub id: u32,
    pub failed: bool,
    pub payload: Vec<u8>,
}

impl Answer {
    pub fn solved(id: u32, payload: Vec<u8>) -> Self {
        Self {
            id,
            failed: false,
            payload,
        }
    }

    pub fn failed(id: u32) -> Self {
        Self {
            id,
            failed: true,
            payload: Vec::new(),
        }
    }

    /// Total encoded length, header included.
    pub fn size(&self) -> u64 {
        (ANSWER_HEADER_LEN + self.payload.len()) as u64
    }
}
