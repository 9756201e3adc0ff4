pub fn leak<T>(inner: T) -> &'static T {
    Box::leak(Box::new(inner))
}
