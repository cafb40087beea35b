//! Minimal terminal binding for a conversation script
//!
//! Demonstrates the boundary a presentation layer consumes: subscribe to
//! the session's bus, render `message` events, and answer `prompt` events
//! with `send`. Run with `RUST_LOG=convo_script=debug` for engine logs.

use std::sync::Arc;

use convo_action_registry::ActionRegistry;
use convo_conditions::Condition;
use convo_core::{template::render_content, ChatEvent, Role};
use convo_script::{ChatScript, ChatSession, MessageDef, SessionOptions};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

fn onboarding_script() -> ChatScript {
    ChatScript::named(
        "onboarding",
        vec![
            MessageDef::delayed("Hi there!", 400),
            MessageDef::prompt("What should I call you?", "name")
                .with_postfetch("get_is_returning", "is_returning"),
            MessageDef::delayed("Welcome back, {{name}}!", 400)
                .with_condition(Condition::equals("is_returning", true)),
            MessageDef::delayed("Nice to meet you, {{name}}.", 400)
                .with_condition(Condition::not(Condition::equals("is_returning", true))),
            MessageDef::prompt("What brings you here today?", "topic"),
            MessageDef::immediate("Got it. Talk soon!"),
        ],
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = Arc::new(ActionRegistry::new());
    registry.register("get_is_returning", |call| async move {
        // Stand-in for a real lookup against a user store.
        let name = call.context.get("name").cloned().unwrap_or_default();
        Ok(json!(name == json!("Ferris")))
    });

    let session = Arc::new(ChatSession::new(
        onboarding_script(),
        registry,
        SessionOptions::default(),
    ));

    let mut events = session.subscribe_all();
    let runner = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.start().await }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let envelope = events.recv().await.expect("event bus closed");
        match envelope.event {
            ChatEvent::Message { message, context } => {
                let speaker = match message.role {
                    Role::Bot => "bot",
                    Role::User => "you",
                };
                println!("{speaker}> {}", render_content(&message.content, &context));
            }
            ChatEvent::Prompt { .. } => {
                let line = lines
                    .next_line()
                    .await
                    .expect("stdin read failed")
                    .unwrap_or_default();
                session.send(line.trim());
            }
            ChatEvent::Finish { context } => {
                println!("--- conversation over ---");
                for (key, value) in context.iter() {
                    println!("  {key} = {value}");
                }
                break;
            }
            _ => {}
        }
    }

    runner.await.expect("runner panicked").expect("run failed");
}
