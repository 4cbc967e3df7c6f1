// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modal flow.
//!
//! Presents an editor as a popover anchored to a toolbar control. A second
//! sheet requested while the first is still animating in stacks on top of it.
//! The sheet is then dropped, and a tap on "save" makes the editor's
//! interaction logic report "Saved" and complete, which dismisses the editor.
//! Nothing polls the editor's stream until the very end: its logic runs as the
//! screen becomes ready and as the tap arrives.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example modal_flow`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::channel::mpsc;
use futures::executor::block_on;
use futures::{StreamExt, stream};
use tracing_subscriber::EnvFilter;
use understory_presenter::adapters::scene_tree::SceneHost;
use understory_presenter::{
    ActionError, Anchor, DisposeBag, Presenter, SceneConfig, ScreenFactory, Serializer,
    WorkerConfig, WorkerQueue, presentation_chain,
};
use understory_scene_tree::{ControlId, SceneDefinition, SceneTree, Transitions};

#[derive(Clone, Debug)]
enum EditorAction {
    Saved,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree = SceneTree::with_transitions(Transitions::Deferred);
    tree.catalog_mut().register(
        None,
        "Editor",
        SceneDefinition::single("main").with_identifier("confirm"),
    );
    let root = tree.create_screen("root");
    tree.set_root(root).unwrap();

    let host = Arc::new(SceneHost::new(tree));
    let queue = Arc::new(WorkerQueue::spawn(WorkerConfig::default()).unwrap());
    let presenter = Presenter::new(host.clone(), queue.clone());

    let (save_button, taps) = mpsc::unbounded::<Result<EditorAction, ActionError>>();
    let editor = presenter.present_modal(
        || host.produce(&SceneConfig::named("Editor")).unwrap(),
        true,
        Anchor::Control(ControlId(1)),
        |bag: &DisposeBag, screen| {
            println!("editor {screen:?} is ready");
            bag.insert(|| println!("editor resources released"));
            taps.take(1)
        },
    );
    let confirm = presenter.present_modal(
        || {
            host.produce(&SceneConfig::named("Editor").with_identifier("confirm"))
                .unwrap()
        },
        true,
        Anchor::None,
        |_bag: &DisposeBag, _screen| stream::pending::<Result<(), ActionError>>(),
    );

    // Play the two presentation animations through.
    settle(&host);
    host.with_tree(|t| {
        let chain: Vec<_> = presentation_chain(&*t)
            .into_iter()
            .filter_map(|s| t.label(s).map(str::to_owned))
            .collect();
        println!("presentation chain: {}", chain.join(" -> "));
    });

    drop(confirm);
    settle(&host);

    println!("user taps save");
    save_button.unbounded_send(Ok(EditorAction::Saved)).unwrap();
    println!("editor state: {:?}", editor.state());
    settle(&host);
    block_on(queue.barrier());
    for action in block_on(editor.collect::<Vec<_>>()) {
        println!("editor reported {:?}", action.unwrap());
    }

    host.with_tree(|t| {
        for event in t.take_journal() {
            println!("{event:?}");
        }
        assert_eq!(t.presented(root), None);
    });
}

/// Finish in-flight transitions until the worker stops starting new ones.
fn settle(host: &SceneHost) {
    for _ in 0..20 {
        thread::sleep(Duration::from_millis(10));
        host.with_tree(|t| t.finish_transitions());
    }
}
