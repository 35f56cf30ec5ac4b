pub fn extra_fn() {}
