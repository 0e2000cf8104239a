/// Expands to a `submit` call at the given level. Arguments are taken by
/// reference, so logging never moves the caller's values.
#[macro_export]
macro_rules! flog {
    ($level:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::submit($level, $fmt, ($(&$arg,)*))
    };
}

#[macro_export]
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Trace, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Debug, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Info, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Warn, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Error, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! fatal {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::flog!($crate::Level::Fatal, $fmt $(, $arg)*)
    };
}
