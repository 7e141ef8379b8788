//! Lifecycle properties checked across the transport boundary.

use proptest::prelude::*;
use satellite_dispatch::{Hook, HookPhase, Manifest, PreFailurePolicy};
use satellite_test::{RecordingApp, Step, TestHost};

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Pre), Just(Step::Post), Just(Step::CleanUp)]
}

fn manifest(hooks: usize) -> Manifest {
    (0..hooks)
        .fold(Manifest::builder("prop"), |b, i| {
            b.hook(Hook::new(format!("hook-{}", i), "ignite chain build"))
        })
        .build()
        .unwrap()
}

proptest! {
    /// Every triggered hook is cleaned up exactly once, in reverse trigger
    /// order, whichever phases fail or panic.
    #[test]
    fn every_hook_cleans_up_once(
        hooks in 1usize..4,
        failing in prop::option::of(step_strategy()),
        panicking in prop::option::of(step_strategy()),
        action_fails in any::<bool>(),
        abort in any::<bool>(),
    ) {
        let mut app = RecordingApp::new(manifest(hooks));
        if let Some(step) = failing {
            app = app.fail(step, "failed");
        }
        if let Some(step) = panicking {
            app = app.panic_on(step, "panicked");
        }
        let policy = if abort { PreFailurePolicy::Abort } else { PreFailurePolicy::Advisory };
        let host = TestHost::new(app.clone()).with_policy(policy);

        let outcome = host.trigger("ignite chain build", || {
            if action_fails { Err("action failed") } else { Ok(()) }
        });

        prop_assert_eq!(outcome.reports.len(), hooks);
        prop_assert_eq!(app.count(Step::CleanUp), hooks);

        let clean_ups: Vec<String> = app
            .steps()
            .into_iter()
            .filter(|s| s.starts_with("clean-up "))
            .collect();
        let expected: Vec<String> = (0..hooks).rev().map(|i| format!("clean-up hook-{}", i)).collect();
        prop_assert_eq!(clean_ups, expected);

        for report in &outcome.reports {
            prop_assert_eq!(report.invoked.last(), Some(&HookPhase::CleanUp));
            let phase_errors = report.errors.iter().filter(|e| e.phase == HookPhase::CleanUp).count();
            prop_assert!(phase_errors <= 1);
        }
    }
}

#[test]
fn capability_calls_reach_the_mock() {
    use satellite_dispatch::{Command, Dispatcher, OP_GET_CHAIN_INFO};

    let manifest = Manifest::builder("info")
        .command(Command::new("info"))
        .build()
        .unwrap();
    let app = Dispatcher::builder(manifest)
        .command("info", |_, ctx| {
            anyhow::ensure!(ctx.chain_info()?.chain_id == "mars", "unexpected chain");
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let host = TestHost::new(app);
    host.run(&["info"]).unwrap();
    assert_eq!(host.api().calls(), vec![OP_GET_CHAIN_INFO]);
}
