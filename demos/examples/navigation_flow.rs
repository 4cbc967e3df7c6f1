// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Navigation flow.
//!
//! Pushes a detail screen onto a stack, then removes it with a back gesture
//! before its interaction logic finishes: the action stream ends with the
//! screen and detach leaves the stack alone. A second screen is shown from the
//! list; its logic completes as soon as the picker is ready, so it is popped
//! again before `show` returns and its choice waits in the stream.
//!
//! Run:
//! - `RUST_LOG=trace cargo run -p understory_demos --example navigation_flow`

use std::sync::Arc;

use futures::executor::block_on;
use futures::{StreamExt, stream};
use tracing_subscriber::EnvFilter;
use understory_presenter::adapters::scene_tree::SceneHost;
use understory_presenter::{ActionError, DisposeBag, InlineQueue, Presenter, WrapperState};
use understory_scene_tree::SceneTree;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree = SceneTree::new();
    let list = tree.create_screen("list");
    let stack = tree.create_stack(list).unwrap();
    let host = Arc::new(SceneHost::new(tree));
    let presenter = Presenter::new(host.clone(), Arc::new(InlineQueue));

    let detail = host.create_screen("detail");
    let actions = presenter.push(
        || detail,
        stack,
        true,
        |_bag: &DisposeBag, screen| {
            println!("detail {screen:?} is ready");
            stream::pending::<Result<u32, ActionError>>()
        },
    );
    print_stack(&host, stack);

    println!("user swipes back");
    host.with_tree(|t| t.pop(stack, true));
    println!("detail state after the gesture: {:?}", actions.state());
    assert_eq!(
        actions.state(),
        WrapperState::Terminated(understory_presenter::Termination::ScreenDestroyed)
    );
    let rest = block_on(actions.collect::<Vec<_>>());
    println!("detail ended with {} actions", rest.len());
    print_stack(&host, stack);

    let picker = host.create_screen("picker");
    let choices = presenter.show(
        || picker,
        list,
        None,
        |_bag: &DisposeBag, _screen| stream::iter(vec![Ok::<_, ActionError>("blue")]),
    );
    print_stack(&host, stack);
    for choice in block_on(choices.collect::<Vec<_>>()) {
        println!("picked {}", choice.unwrap());
    }
    print_stack(&host, stack);

    for event in host.with_tree(|t| t.take_journal()) {
        println!("{event:?}");
    }
}

fn print_stack(host: &SceneHost, stack: understory_scene_tree::StackId) {
    host.with_tree(|t| {
        let labels: Vec<_> = t
            .stack_screens(stack)
            .unwrap_or_default()
            .iter()
            .filter_map(|s| t.label(*s))
            .collect();
        println!("stack: [{}]", labels.join(", "));
    });
}
