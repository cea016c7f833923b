// Schedule namespace

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::Schedule;

#[derive(Debug, Deserialize)]
struct ScheduleList {
    #[serde(default)]
    jobs: Vec<Schedule>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u32,
}

impl RpcClient {
    /// `Schedule.List`
    pub async fn list_schedules(&self) -> Result<Vec<Schedule>, Error> {
        let list: ScheduleList = self.call("Schedule.List", None).await?;
        Ok(list.jobs)
    }

    /// Create a schedule, returning the device-assigned id. Any `id` on
    /// `schedule` is ignored.
    ///
    /// `Schedule.Create`
    pub async fn create_schedule(&self, schedule: &Schedule) -> Result<u32, Error> {
        let mut params = schedule.clone();
        params.id = None;
        let created: Created = self
            .call("Schedule.Create", Some(to_params("Schedule.Create", &params)?))
            .await?;
        debug!(id = created.id, "created schedule");
        Ok(created.id)
    }

    /// Overwrite the schedule with `id`.
    ///
    /// `Schedule.Update`
    pub async fn update_schedule(&self, id: u32, schedule: &Schedule) -> Result<(), Error> {
        let mut params = schedule.clone();
        params.id = Some(id);
        let _: Value = self
            .call("Schedule.Update", Some(to_params("Schedule.Update", &params)?))
            .await?;
        Ok(())
    }

    /// `Schedule.Delete`
    pub async fn delete_schedule(&self, id: u32) -> Result<(), Error> {
        let _: Value = self
            .call("Schedule.Delete", Some(json!({ "id": id })))
            .await?;
        Ok(())
    }
}

pub(crate) fn to_params<T: serde::Serialize>(method: &str, value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Deserialization {
        method: method.to_owned(),
        message: e.to_string(),
        body: String::new(),
    })
}
