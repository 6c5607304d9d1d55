use std::fmt;

#[macro_export]
macro_rules! fail {
    ($kind:ident, $msg:literal) => {
        return Err(DexError::new(ErrorKind::$kind, $msg))
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::new(ErrorKind::$kind, &format!($fmtstr, $($args)*)))
    };
}

/// The failure classes surfaced by the decoder.
///
/// `Truncated`, `OutOfRange`, `MalformedUleb` and `UnterminatedString` come
/// from the byte cursor; the rest from structural validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{
    InvalidMagic,
    HeaderMismatch,
    Truncated,
    OutOfRange,
    MalformedUleb,
    UnterminatedString,
    IndexOutOfPool,
    DecodeClassFailed,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DexError
{
    kind: ErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl DexError
{
    pub fn new(kind: ErrorKind, msg: &str) -> Self
    {
        DexError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub fn with_context(base: DexError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        DexError { kind: base.kind, msg: base.msg, contexts }
    }

    pub fn kind(&self) -> ErrorKind
    {
        self.kind
    }
}

impl fmt::Display for DexError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_display()
    {
        let base = DexError::new(ErrorKind::Truncated, "unexpected end of stream");
        let e = DexError::with_context(base, "code item".to_string());
        let e = DexError::with_context(e, "method foo()V".to_string());
        assert_eq!(e.to_string(), "unexpected end of stream for code item of method foo()V");
        assert_eq!(e.kind(), ErrorKind::Truncated);
    }
}
