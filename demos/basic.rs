use clientapi::{parse, responses::Collection, sessions, ApiRequest, ClientApi};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("CLIENTAPI_BASE_URL")?;
    let session = sessions::bearer_from_env("CLIENTAPI_TOKEN")?;

    let api = ClientApi::new(session, url).with_request_logging(true);
    let response = api
        .execute_request(ApiRequest::new("/repos").param("per_page", "10"))
        .await?;

    for repo in parse::<Collection<Repo>>(&response)? {
        println!("{}", repo.name);
    }

    Ok(())
}
