#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::bot::Bot;
    use crate::command::{Command, CommandContext, OptionKind, OptionSpec};
    use crate::dispatcher::TIMEOUT_MESSAGE;
    use crate::error::Error;
    use crate::mocks::{MockTransport, TransportCall};
    use crate::transport::{Interaction, InteractionEvent, InteractionKind, Scope};

    const GUILD: u64 = 200;

    fn bot_with(mock: &MockTransport) -> Bot<MockTransport> {
        let mut bot = Bot::with_transport(mock.clone(), Scope::Guild(GUILD));
        bot.add_command("ping", "Replies with pong", vec![], |_ctx| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "pong".to_string()
        })
        .unwrap();
        bot
    }

    fn command_event(name: &str, id: u64) -> InteractionEvent {
        InteractionEvent {
            kind: InteractionKind::ApplicationCommand,
            interaction: Interaction {
                id,
                token: format!("token-{id}"),
                guild_id: Some(GUILD),
                channel_id: 100,
                user_id: 10,
            },
            command_name: name.to_string(),
            options: vec![],
        }
    }

    fn overwrite(commands: &[&str]) -> TransportCall {
        TransportCall::BulkOverwrite {
            scope: Scope::Guild(GUILD),
            commands: commands.iter().map(|c| c.to_string()).collect(),
        }
    }

    // ── construction ──────────────────────────────────────────────────────────

    #[test]
    fn test_default_timeout_is_thirty_seconds() {
        let bot = Bot::with_transport(MockTransport::new(), Scope::Global);
        assert_eq!(bot.timeout(), Duration::from_secs(30));
        assert!(bot.registry().is_empty());
    }

    #[test]
    fn test_set_timeout_overrides_default() {
        let bot = Bot::with_transport(MockTransport::new(), Scope::Global);
        bot.set_timeout(Duration::from_millis(500));
        assert_eq!(bot.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let mock = MockTransport::new();
        let mut bot = bot_with(&mock);
        let err = bot
            .add_command("ping", "Another ping", vec![], |_ctx| async {
                "again".to_string()
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCommand(_)));
        assert_eq!(bot.registry().len(), 1);
    }

    #[test]
    fn test_command_bind_registers() {
        let mut bot = Bot::with_transport(MockTransport::new(), Scope::Global);
        Command::new("echo", "Echo text", |ctx: CommandContext<MockTransport>| async move {
            ctx.options.str("message").unwrap_or_default().to_string()
        })
        .option(OptionSpec::new(OptionKind::String, "message", "Text").required(true))
        .bind(&mut bot)
        .unwrap();

        let spec = bot.registry().lookup("echo").expect("echo bound");
        assert_eq!(spec.options().len(), 1);
    }

    #[test]
    fn test_new_rejects_malformed_token() {
        let err = Bot::new("not-a-token", "").err().expect("token rejected");
        assert!(matches!(err, Error::ConnectionInit(_)));
    }

    #[test]
    fn test_new_rejects_bad_scope() {
        let err = Bot::new("MTIz.NDU2.Nzg5", "my-guild").err().expect("scope rejected");
        assert!(matches!(err, Error::InvalidScope(ref s) if s == "my-guild"));
    }

    #[test]
    fn test_new_parses_guild_scope() {
        let bot = Bot::new("MTIz.NDU2.Nzg5", "123456").unwrap();
        assert_eq!(bot.scope(), Scope::Guild(123456));
        assert_eq!(bot.timeout(), Duration::from_secs(30));
    }

    // ── lifecycle ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cancel_retracts_then_closes() {
        let mock = MockTransport::new();
        let bot = bot_with(&mock);
        let token = CancellationToken::new();
        token.cancel();

        let result = bot.start(token).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(
            mock.calls(),
            vec![
                TransportCall::Open,
                overwrite(&["ping"]),
                overwrite(&[]),
                TransportCall::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_signal_shutdown_returns_ok() {
        let mock = MockTransport::new();
        let bot = bot_with(&mock);

        let result = bot.run_until(CancellationToken::new(), async {}).await;

        assert!(result.is_ok());
        assert_eq!(
            mock.calls(),
            vec![
                TransportCall::Open,
                overwrite(&["ping"]),
                overwrite(&[]),
                TransportCall::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_open_failure_skips_publication() {
        let mock = MockTransport::new();
        mock.fail_open();
        let bot = bot_with(&mock);

        let result = bot.start(CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::ConnectionOpen(_))));
        assert_eq!(mock.calls(), vec![TransportCall::Open]);
    }

    #[tokio::test]
    async fn test_publication_failure_is_not_fatal() {
        let mock = MockTransport::new();
        mock.fail_publish();
        mock.fail_close();
        let bot = bot_with(&mock);
        let token = CancellationToken::new();
        token.cancel();

        let result = bot.start(token).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(mock.calls().last(), Some(&TransportCall::Close));
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_dispatched_while_running() {
        let mock = MockTransport::new();
        let bot = Arc::new(bot_with(&mock));
        let token = CancellationToken::new();
        mock.push_event(command_event("ping", 1));
        mock.push_event(command_event("unknown", 2));

        let run = tokio::spawn({
            let bot = bot.clone();
            let token = token.clone();
            async move { bot.start(token).await }
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            mock.wait_for(|calls| {
                calls
                    .iter()
                    .any(|c| matches!(c, TransportCall::EditResponse { .. }))
            }),
        )
        .await
        .expect("ping answered");
        token.cancel();

        assert!(matches!(run.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(mock.edits(), vec!["pong".to_string()]);
        assert!(!mock
            .calls()
            .contains(&TransportCall::Acknowledge { interaction_id: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_event_stream_waits_for_shutdown() {
        let mock = MockTransport::new();
        let bot = Arc::new(bot_with(&mock));
        let token = CancellationToken::new();
        mock.close_events();

        let run = tokio::spawn({
            let bot = bot.clone();
            let token = token.clone();
            async move { bot.start(token).await }
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            mock.wait_for(|calls| {
                calls
                    .iter()
                    .any(|c| matches!(c, TransportCall::BulkOverwrite { .. }))
            }),
        )
        .await
        .expect("commands published");
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!run.is_finished());
        assert_eq!(mock.call_count(), 2);

        token.cancel();

        assert!(matches!(run.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(
            mock.calls(),
            vec![
                TransportCall::Open,
                overwrite(&["ping"]),
                overwrite(&[]),
                TransportCall::Close,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_does_not_block_event_loop() {
        let mock = MockTransport::new();
        let mut bot = Bot::with_transport(mock.clone(), Scope::Guild(GUILD));
        bot.add_command("slow", "Takes its time", vec![], |_ctx| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "slow".to_string()
        })
        .unwrap();
        bot.add_command("fast", "Answers quickly", vec![], |_ctx| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "fast".to_string()
        })
        .unwrap();
        let bot = Arc::new(bot);
        let token = CancellationToken::new();
        mock.push_event(command_event("slow", 1));
        mock.push_event(command_event("fast", 2));

        let run = tokio::spawn({
            let bot = bot.clone();
            let token = token.clone();
            async move { bot.start(token).await }
        });

        tokio::time::timeout(
            Duration::from_secs(20),
            mock.wait_for(|calls| {
                calls
                    .iter()
                    .filter(|c| matches!(c, TransportCall::EditResponse { .. }))
                    .count()
                    == 2
            }),
        )
        .await
        .expect("both answered");
        token.cancel();
        run.await.unwrap().unwrap_err();

        assert_eq!(mock.edits(), vec!["fast".to_string(), "slow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_invocation_not_drained_on_shutdown() {
        let mock = MockTransport::new();
        let mut bot = Bot::with_transport(mock.clone(), Scope::Guild(GUILD));
        bot.add_command("slow", "Takes its time", vec![], |_ctx| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "done".to_string()
        })
        .unwrap();
        let bot = Arc::new(bot);
        let token = CancellationToken::new();
        mock.push_event(command_event("slow", 4));

        let run = tokio::spawn({
            let bot = bot.clone();
            let token = token.clone();
            async move { bot.start(token).await }
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            mock.wait_for(|calls| calls.contains(&TransportCall::Acknowledge { interaction_id: 4 })),
        )
        .await
        .expect("slow acknowledged");
        token.cancel();
        assert!(matches!(run.await.unwrap(), Err(Error::Cancelled)));
        assert_eq!(mock.calls().last(), Some(&TransportCall::Close));

        tokio::time::timeout(
            Duration::from_secs(5),
            mock.wait_for(|calls| {
                calls
                    .iter()
                    .any(|c| matches!(c, TransportCall::EditResponse { .. }))
            }),
        )
        .await
        .expect("late edit delivered");
        assert_eq!(
            mock.calls().last(),
            Some(&TransportCall::EditResponse {
                interaction_id: 4,
                content: "done".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_set_before_start_applies() {
        let mock = MockTransport::new();
        let mut bot = Bot::with_transport(mock.clone(), Scope::Guild(GUILD));
        bot.add_command("slow", "Takes its time", vec![], |_ctx| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "done".to_string()
        })
        .unwrap();
        bot.set_timeout(Duration::from_millis(500));
        let bot = Arc::new(bot);
        let token = CancellationToken::new();
        mock.push_event(command_event("slow", 3));

        let run = tokio::spawn({
            let bot = bot.clone();
            let token = token.clone();
            async move { bot.start(token).await }
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            mock.wait_for(|calls| {
                calls
                    .iter()
                    .any(|c| matches!(c, TransportCall::EditResponse { .. }))
            }),
        )
        .await
        .expect("slow answered");

        // Past the handler's own completion time.
        tokio::time::sleep(Duration::from_secs(3)).await;
        token.cancel();
        run.await.unwrap().unwrap_err();

        assert_eq!(mock.edits(), vec![TIMEOUT_MESSAGE.to_string()]);
    }
}
