use super::http::{build_client, HttpSwitch};
use super::mpd::MpdClient;
use super::{ActionDispatcher, DispatchError};
use crate::config::ActionsConfig;
use crate::gesture::table::{ActionId, Switch};

/// Maps each action onto the configured switches and player.
pub struct ActionRouter {
    switch_a: Option<HttpSwitch>,
    switch_b: Option<HttpSwitch>,
    player: Option<MpdClient>,
}

impl ActionRouter {
    pub fn new(
        switch_a: Option<HttpSwitch>,
        switch_b: Option<HttpSwitch>,
        player: Option<MpdClient>,
    ) -> Self {
        Self {
            switch_a,
            switch_b,
            player,
        }
    }

    pub fn from_config(config: &ActionsConfig) -> Result<Self, DispatchError> {
        let client = build_client(&config.user_agent, config.timeout())?;
        let switch = |url: &Option<String>| {
            url.as_ref().map(|u| HttpSwitch::new(client.clone(), u.clone()))
        };
        let player = config.mpd_host.as_ref().map(|host| {
            MpdClient::new(
                host.clone(),
                config.mpd_port,
                config.mpd_password.clone(),
                config.timeout(),
            )
        });
        let router = Self::new(switch(&config.switch_a), switch(&config.switch_b), player);

        for (name, configured) in [
            ("switch A", router.switch_a.is_some()),
            ("switch B", router.switch_b.is_some()),
            ("mpd", router.player.is_some()),
        ] {
            if !configured {
                log::warn!("{} is not configured; gestures using it will fail", name);
            }
        }
        Ok(router)
    }

    fn switch(&self, switch: Switch) -> Result<&HttpSwitch, DispatchError> {
        match switch {
            Switch::A => self.switch_a.as_ref().ok_or(DispatchError::Unconfigured("switch A")),
            Switch::B => self.switch_b.as_ref().ok_or(DispatchError::Unconfigured("switch B")),
        }
    }

    fn player(&self) -> Result<&MpdClient, DispatchError> {
        self.player.as_ref().ok_or(DispatchError::Unconfigured("mpd"))
    }

    /// Every sink is attempted; the first failure is returned.
    fn stop_everything(&self) -> Result<(), DispatchError> {
        let results = [
            self.switch(Switch::B).and_then(|s| s.set(false)),
            self.switch(Switch::A).and_then(|s| s.set(false)),
            self.player().and_then(|p| p.stop()),
        ];
        results.into_iter().collect()
    }
}

impl ActionDispatcher for ActionRouter {
    fn dispatch(&mut self, action: ActionId) -> Result<(), DispatchError> {
        match action {
            ActionId::ToggleOn(switch) => self.switch(switch)?.set(true),
            ActionId::ToggleOff(switch) => self.switch(switch)?.set(false),
            ActionId::ResumePlayback => self.player()?.play(),
            ActionId::PausePlayback => self.player()?.stop(),
            ActionId::PanicStopAll => self.stop_everything(),
        }
    }
}
