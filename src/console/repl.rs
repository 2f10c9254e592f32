// Line-based REPL driving the workflow - the stand-in for the chat surface.
//
// Plain input is treated as ad text; slash commands map to workflow events.
// Events that hit the network run in their own task so the prompt stays
// responsive and /cancel can reach a session mid-flight.

use crate::core::moderation::Classifier;
use crate::core::workflow::{AdStore, AdTextWorkflow, ConfirmChoice, MessagingPort, Rewriter};
use crate::infra::storage::MemoryAdStore;
use crate::infra::transport::TransportSelector;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Команды:
  <текст>            отправить текст объявления на проверку
  /improve           улучшить текст с помощью ИИ
  /confirm           опубликовать исходный текст
  /confirm_new       опубликовать улучшенный текст
  /cancel            отменить текущее объявление
  /quota             остаток ИИ-улучшений на сегодня
  /ads               мои опубликованные объявления
  /status            состояние текущей сессии
  /user <id>         переключить пользователя
  /transports        состояние исходящих маршрутов
  /reset_transports  восстановить все маршруты
  /help              этот список
  /quit              выход";

pub async fn run<C, R, M, S>(
    workflow: Arc<AdTextWorkflow<C, R, M, S>>,
    transports: Arc<TransportSelector>,
    store: Arc<MemoryAdStore>,
) -> std::io::Result<()>
where
    C: Classifier + 'static,
    R: Rewriter + 'static,
    M: MessagingPort + 'static,
    S: AdStore + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut user_id: u64 = 1;

    println!("{HELP}\n");
    print_prompt(user_id);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}

            "/quit" | "/exit" => break,

            "/help" => println!("{HELP}"),

            "/improve" => {
                let workflow = workflow.clone();
                tokio::spawn(async move { workflow.request_rewrite(user_id).await });
            }

            "/confirm" => {
                spawn_confirm(workflow.clone(), user_id, ConfirmChoice::Original);
            }

            "/confirm_new" => {
                spawn_confirm(workflow.clone(), user_id, ConfirmChoice::Rewritten);
            }

            "/cancel" => workflow.cancel(user_id).await,

            "/quota" => {
                let (used, limit) = workflow.quota_usage(user_id);
                println!("Использовано ИИ-улучшений сегодня: {used}/{limit}");
            }

            "/ads" => {
                let ads = store.confirmed_for(user_id);
                if ads.is_empty() {
                    println!("Опубликованных объявлений нет.");
                }
                for ad in ads {
                    println!("  [{}] {}", ad.confirmed_at.format("%Y-%m-%d %H:%M"), ad.text);
                }
            }

            "/status" => match workflow.session_state(user_id) {
                Some(state) => println!("Состояние сессии: {state:?}"),
                None => println!("Активной сессии нет."),
            },

            "/transports" => {
                for (name, healthy) in transports.health() {
                    let mark = if healthy { "✅" } else { "⛔" };
                    println!("  {mark} {name}");
                }
            }

            "/reset_transports" => {
                transports.reset();
                println!("Маршруты восстановлены.");
            }

            other if other.starts_with("/user ") => {
                match other["/user ".len()..].trim().parse::<u64>() {
                    Ok(id) => {
                        user_id = id;
                        println!("Текущий пользователь: {id}");
                    }
                    Err(_) => println!("Использование: /user <число>"),
                }
            }

            other if other.starts_with('/') => {
                println!("Неизвестная команда. /help - список команд.");
            }

            text => {
                let workflow = workflow.clone();
                let text = text.to_string();
                tokio::spawn(async move { workflow.submit_text(user_id, text).await });
            }
        }
        print_prompt(user_id);
    }

    Ok(())
}

fn spawn_confirm<C, R, M, S>(
    workflow: Arc<AdTextWorkflow<C, R, M, S>>,
    user_id: u64,
    choice: ConfirmChoice,
) where
    C: Classifier + 'static,
    R: Rewriter + 'static,
    M: MessagingPort + 'static,
    S: AdStore + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = workflow.confirm(user_id, choice).await {
            println!("⚠️ Не удалось сохранить объявление: {err}. Попробуйте ещё раз.");
        }
    });
}

fn print_prompt(user_id: u64) {
    print!("[user {user_id}] > ");
    let _ = std::io::stdout().flush();
}
