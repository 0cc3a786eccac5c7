use std::ffi::CStr;
use std::ptr;
use std::sync::Arc;

use sohost::abi::{self, dl, stubs::StubKind};
use sohost::config::ConfigError;
use sohost::host::{Graphics, HeadlessGraphics, NullAudio};
use sohost::{Config, Context, Error};

fn dlsym(name: &CStr) -> usize {
    unsafe {
        let handle = dl::dlopen(c"libGLESv2.so".as_ptr(), 0);
        assert!(!handle.is_null());
        dl::dlsym(handle, name.as_ptr()) as usize
    }
}

#[test]
fn installed_context_answers_dynamic_lookups() {
    let graphics: Arc<dyn Graphics> = Arc::new(HeadlessGraphics);
    let context = Arc::new(Context::new(&Config::default(), graphics, &NullAudio).expect("context"));

    let table = Arc::clone(&context.table);
    assert!(table.resolve("slCreateEngine").is_some());
    assert!(table.resolve("glClear").is_some());
    let stubs: Vec<_> = table.stubs().map(|(entry, kind)| (entry.name.clone(), kind)).collect();
    assert!(stubs.contains(&("glClear".to_string(), StubKind::Zero)));
    assert!(stubs.contains(&("ov_read".to_string(), StubKind::VorbisFault)));

    let bridge = Arc::clone(&context.bridge);
    assert!(abi::install(context));
    assert_eq!(sohost::bridge::Android_JNI_GetEnv(), bridge.env_handle());

    assert_eq!(dlsym(c"strlen"), table.resolve("strlen").expect("strlen"));
    // not in the table, answered by the graphics provider
    assert_eq!(dlsym(c"glDrawArraysInstanced"), StubKind::Zero.address());
    assert_eq!(dlsym(c"no_such_function"), 0);
    assert!(dl::dlerror().is_null());
    assert_eq!(dl::dlclose(ptr::null_mut()), 0);
}

#[test]
fn invalid_configuration_is_reported() {
    let config = Config {
        screen: (0, 544),
        ..Default::default()
    };
    let graphics: Arc<dyn Graphics> = Arc::new(HeadlessGraphics);
    match Context::new(&config, graphics, &NullAudio) {
        Err(Error::Config(ConfigError::Screen { width: 0, height: 544 })) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("zero-width screen accepted"),
    }
}
