macro_rules! verbose {
    ($($arg:tt)*) => (
        ::log::debug!($($arg)*)
    );
}
