/// Locks `$mutex` for the duration of `$block`, binding the guard as `$guard`.
#[macro_export]
macro_rules! with_lock {
    ($mutex:expr, |$guard:ident| $block:block) => {{
        #[allow(unused_mut)]
        let mut $guard = $mutex.lock();
        $block
    }};
}
