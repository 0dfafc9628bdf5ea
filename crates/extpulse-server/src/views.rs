use extpulse_model::{CategoryCounts, SessionRecord};
use extpulse_query::DashboardRollup;
use minijinja::value::Value;
use minijinja::{context, Environment};

/// Embedded minijinja environment for the two dashboard pages.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Default for Views {
    fn default() -> Self {
        let mut env = Environment::new();
        env.add_template("dashboard.html", include_str!("../templates/dashboard.html"))
            .expect("embedded dashboard template");
        env.add_template(
            "my_analytics.html",
            include_str!("../templates/my_analytics.html"),
        )
        .expect("embedded my-analytics template");
        Self { env }
    }
}

impl Views {
    pub fn render_dashboard(&self, rollup: &DashboardRollup) -> Result<String, minijinja::Error> {
        self.env.get_template("dashboard.html")?.render(context! {
            sessions => Value::from_serialize(&rollup.sessions),
            users => Value::from_serialize(&rollup.users),
        })
    }

    pub fn render_my_analytics(
        &self,
        caller_ip: &str,
        sessions: &[SessionRecord],
        totals: &CategoryCounts,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template("my_analytics.html")?
            .render(context! {
                callerIp => caller_ip,
                sessions => Value::from_serialize(sessions),
                totals => Value::from_serialize(totals),
            })
    }
}
