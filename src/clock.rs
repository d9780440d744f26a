// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Glitch-free programming of the PLL and source muxes of one clock domain.

use crate::{
    arch::{delay_us, dsb_sy},
    rails::{RailBackend, RailKind, RailSet},
    tables::{CoreSpeed, PrimarySource, SecondarySource},
};
use bitflags::bitflags;
use log::{debug, error};

/// Identifies a clock domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DomainId {
    /// The domain of the CPU core with the given index.
    Core(usize),
    /// The shared L2 domain.
    L2,
}

/// The registers of the HFPLL block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PllRegister {
    /// Mode control: reset, bypass and output enable.
    Mode,
    /// Analog configuration.
    ConfigCtl,
    /// The multiplier.
    LVal,
    /// The fractional multiplier numerator.
    MVal,
    /// The fractional multiplier denominator.
    NVal,
    /// Droop detector control.
    DroopCtl,
}

/// Raw access to the clock hardware of one domain.
///
/// The clock and power mux register (CPMR) holds the primary and secondary source selectors. Bit
/// layouts are interpreted by [`ClockSourceController`], implementations only move words.
pub trait ClockRegisters {
    /// Reads the clock and power mux register.
    fn read_cpmr(&mut self) -> u32;

    /// Writes the clock and power mux register.
    fn write_cpmr(&mut self, value: u32);

    /// Writes the auxiliary clock selector.
    fn write_aux_clk_sel(&mut self, value: u32);

    /// Writes one of the HFPLL registers.
    fn write_pll(&mut self, register: PllRegister, value: u32);
}

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct Cpmr: u32 {
        const PRI_SRC_SEL = 0b11;
        const SEC_SRC_SEL = 0b11 << 2;
        /// Disables secondary source clock gating while the secondary mux switches.
        const SECCLKAGD = 1 << 4;
        const L2_DIV = 0b11 << 6;

        const _ = !0;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct PllMode: u32 {
        const OUTCTRL = 1 << 0;
        const BYPASSNL = 1 << 1;
        const RESET_N = 1 << 2;
    }
}

const SEC_SRC_SHIFT: u32 = 2;

/// Selects PLL8 on the auxiliary mux.
const AUX_CLK_SEL_PLL8: u32 = 0x3;

const HFPLL_CONFIG_CTL: u32 = 0x7845_C665;
const HFPLL_M_VAL: u32 = 0;
const HFPLL_N_VAL: u32 = 1;
const HFPLL_DROOP_CTL: u32 = 0x0108_C000;

const MUX_SETTLE_US: u32 = 1;
const PLL_BYPASS_SETTLE_US: u32 = 10;
const PLL_LOCK_US: u32 = 60;

/// Voltage of the first PLL analog supply while the PLL is running, in µV.
pub const HFPLL_VDD_A_UV: u32 = 2_050_000;
/// Voltage of the second PLL analog supply while the PLL is running, in µV.
pub const HFPLL_VDD_B_UV: u32 = 1_800_000;

/// The primary and secondary selectors of a domain, saved while it is parked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParkedSelectors {
    /// The primary source selector.
    pub primary: PrimarySource,
    /// The secondary source selector.
    pub secondary: SecondarySource,
}

/// Performs named operations on the muxes and PLL of one clock domain.
#[derive(Debug)]
pub struct ClockSourceController<R> {
    regs: R,
}

impl<R: ClockRegisters> ClockSourceController<R> {
    /// Creates a controller over the given registers.
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    fn cpmr(&mut self) -> Cpmr {
        Cpmr::from_bits_retain(self.regs.read_cpmr())
    }

    /// Returns the current primary source selector.
    pub fn primary_source(&mut self) -> PrimarySource {
        (self.cpmr() & Cpmr::PRI_SRC_SEL).bits().into()
    }

    /// Returns the current secondary source selector.
    pub fn secondary_source(&mut self) -> SecondarySource {
        ((self.cpmr() & Cpmr::SEC_SRC_SEL).bits() >> SEC_SRC_SHIFT).into()
    }

    /// Switches the primary mux, then waits for the switch to take effect.
    pub fn set_primary_source(&mut self, source: PrimarySource) {
        let mut cpmr = self.cpmr();
        cpmr.remove(Cpmr::PRI_SRC_SEL);
        cpmr |= Cpmr::from_bits_retain(u32::from(source)) & Cpmr::PRI_SRC_SEL;
        self.regs.write_cpmr(cpmr.bits());
        dsb_sy();
        delay_us(MUX_SETTLE_US);
    }

    /// Switches the secondary mux with clock gating held off, then waits for the switch to take
    /// effect.
    pub fn set_secondary_source(&mut self, source: SecondarySource) {
        let mut cpmr = self.cpmr();
        cpmr |= Cpmr::SECCLKAGD;
        self.regs.write_cpmr(cpmr.bits());

        cpmr.remove(Cpmr::SEC_SRC_SEL);
        cpmr |= Cpmr::from_bits_retain(u32::from(source) << SEC_SRC_SHIFT) & Cpmr::SEC_SRC_SEL;
        self.regs.write_cpmr(cpmr.bits());

        dsb_sy();
        delay_us(MUX_SETTLE_US);

        cpmr.remove(Cpmr::SECCLKAGD);
        self.regs.write_cpmr(cpmr.bits());
    }

    /// Points the auxiliary mux at PLL8.
    pub fn select_aux_pll8(&mut self) {
        self.regs.write_aux_clk_sel(AUX_CLK_SEL_PLL8);
    }

    /// Clears the L2 clock divider so the domain runs at the undivided source rate.
    pub fn clear_l2_divider(&mut self) {
        let mut cpmr = self.cpmr();
        cpmr.remove(Cpmr::L2_DIV);
        self.regs.write_cpmr(cpmr.bits());
    }

    /// Writes the fixed HFPLL configuration. The PLL must be off.
    pub fn configure_pll(&mut self) {
        self.regs.write_pll(PllRegister::ConfigCtl, HFPLL_CONFIG_CTL);
        self.regs.write_pll(PllRegister::MVal, HFPLL_M_VAL);
        self.regs.write_pll(PllRegister::NVal, HFPLL_N_VAL);
        self.regs.write_pll(PllRegister::DroopCtl, HFPLL_DROOP_CTL);
    }

    /// Sets the HFPLL multiplier. The PLL must be off.
    pub fn set_pll_l_val(&mut self, l_val: u32) {
        self.regs.write_pll(PllRegister::LVal, l_val);
    }

    fn set_pll_mode(&mut self, mode: PllMode) {
        self.regs.write_pll(PllRegister::Mode, mode.bits());
    }

    /// Takes the HFPLL out of reset, waits for it to lock and enables its output.
    pub fn pll_on(&mut self) {
        self.set_pll_mode(PllMode::BYPASSNL);
        dsb_sy();
        delay_us(PLL_BYPASS_SETTLE_US);

        self.set_pll_mode(PllMode::BYPASSNL | PllMode::RESET_N);
        dsb_sy();
        delay_us(PLL_LOCK_US);

        self.set_pll_mode(PllMode::BYPASSNL | PllMode::RESET_N | PllMode::OUTCTRL);
    }

    /// Turns the HFPLL off immediately.
    pub fn pll_off(&mut self) {
        self.set_pll_mode(PllMode::empty());
    }
}

/// How much of a source switch to perform on a domain.
///
/// Only `Full` touches the domain's muxes, so only `Full` needs to run on the core which owns
/// them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwitchMode {
    /// The full break-before-make sequence.
    Full,
    /// Only enable or disable the PLL, leaving the muxes alone.
    PllOnly,
    /// Touch nothing, only commit the new speed.
    Skip,
}

/// One clock domain: its controller, the speed it is running at and the rails feeding it.
#[derive(Debug)]
pub struct ClockDomain<R> {
    controller: ClockSourceController<R>,
    current: CoreSpeed,
    rails: RailSet,
}

impl<R: ClockRegisters> ClockDomain<R> {
    /// Creates a domain which is assumed to be running from the standby source.
    pub fn new(regs: R, rails: RailSet) -> Self {
        Self {
            controller: ClockSourceController::new(regs),
            current: CoreSpeed::STANDBY,
            rails,
        }
    }

    /// Returns the speed most recently committed for the domain.
    pub fn current(&self) -> &CoreSpeed {
        &self.current
    }

    /// Returns the rails feeding the domain.
    pub fn rails(&self) -> &RailSet {
        &self.rails
    }

    /// Returns the rails feeding the domain, for modification.
    pub fn rails_mut(&mut self) -> &mut RailSet {
        &mut self.rails
    }

    fn pll_enable(&mut self, backend: &impl RailBackend, with_regulators: bool) {
        if with_regulators {
            for (kind, uv) in [
                (RailKind::PllA, HFPLL_VDD_A_UV),
                (RailKind::PllB, HFPLL_VDD_B_UV),
            ] {
                if let Err(e) = self.rails.set(backend, kind, uv) {
                    error!("HFPLL regulator enable failed: {e}");
                }
            }
        }
        self.controller.pll_on();
    }

    fn pll_disable(&mut self, backend: &impl RailBackend, with_regulators: bool) {
        self.controller.pll_off();
        if with_regulators {
            for kind in [RailKind::PllB, RailKind::PllA] {
                if let Err(e) = self.rails.set(backend, kind, 0) {
                    error!("HFPLL regulator disable failed: {e}");
                }
            }
        }
    }

    /// Moves the domain to `target` without ever letting its clock glitch, and commits `target` as
    /// the current speed.
    ///
    /// Between two HFPLL speeds the domain is parked on the auxiliary source while the PLL is
    /// reprogrammed. Otherwise the PLL is brought up before it is selected, or turned off after it
    /// has been deselected.
    pub fn switch_to(&mut self, target: &CoreSpeed, mode: SwitchMode, backend: &impl RailBackend) {
        if *target == self.current {
            return;
        }

        match (self.current.is_hfpll(), target.is_hfpll()) {
            (true, true) => match mode {
                SwitchMode::Full => {
                    self.controller.set_secondary_source(SecondarySource::Aux);
                    self.controller
                        .set_primary_source(PrimarySource::SecondarySource);
                    self.pll_disable(backend, false);
                    self.controller.set_pll_l_val(target.pll_l_val);
                    self.pll_enable(backend, false);
                    self.controller.set_primary_source(target.primary);
                }
                SwitchMode::PllOnly => {
                    self.pll_disable(backend, false);
                    self.controller.set_pll_l_val(target.pll_l_val);
                    self.pll_enable(backend, false);
                }
                SwitchMode::Skip => {}
            },
            (true, false) => match mode {
                SwitchMode::Full => {
                    self.controller.set_secondary_source(target.secondary);
                    self.controller.set_primary_source(target.primary);
                    self.pll_disable(backend, true);
                }
                SwitchMode::PllOnly => self.pll_disable(backend, true),
                SwitchMode::Skip => {}
            },
            (false, true) => match mode {
                SwitchMode::Full => {
                    self.controller.set_pll_l_val(target.pll_l_val);
                    self.pll_enable(backend, true);
                    self.controller.set_primary_source(target.primary);
                }
                SwitchMode::PllOnly => {
                    self.controller.set_pll_l_val(target.pll_l_val);
                    self.pll_enable(backend, true);
                }
                SwitchMode::Skip => {}
            },
            (false, false) => {
                if mode == SwitchMode::Full {
                    self.controller.set_secondary_source(target.secondary);
                }
            }
        }

        self.current = *target;
    }

    /// Brings the domain up from an unknown state to `target`.
    ///
    /// The domain is parked on PLL8 while its HFPLL is configured from scratch.
    pub fn init_clock_sources(&mut self, target: &CoreSpeed, backend: &impl RailBackend) {
        debug!("Initialising clock sources for {} kHz", target.khz);
        self.controller.select_aux_pll8();
        self.controller.set_secondary_source(SecondarySource::Aux);
        self.controller
            .set_primary_source(PrimarySource::SecondarySource);

        self.pll_disable(backend, false);
        self.controller.configure_pll();
        self.controller.set_pll_l_val(target.pll_l_val);
        self.pll_enable(backend, true);

        self.controller.clear_l2_divider();

        self.controller.set_secondary_source(target.secondary);
        self.controller.set_primary_source(target.primary);
        self.current = *target;
    }

    /// Moves the domain onto the always-on source, returning the selectors it was using.
    ///
    /// The committed speed is unchanged, as the domain is expected to be powered off next.
    pub fn park_on_standby(&mut self) -> ParkedSelectors {
        let parked = ParkedSelectors {
            primary: self.controller.primary_source(),
            secondary: self.controller.secondary_source(),
        };
        self.controller.set_secondary_source(SecondarySource::Qsb);
        self.controller
            .set_primary_source(PrimarySource::SecondarySource);
        parked
    }

    /// Puts back the selectors saved by [`Self::park_on_standby`].
    pub fn restore_selectors(&mut self, parked: ParkedSelectors) {
        self.controller.set_secondary_source(parked.secondary);
        self.controller.set_primary_source(parked.primary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::BackendError,
        rails::{DomainRails, RailConfig, RailId},
    };
    use std::{cell::RefCell, rc::Rc};

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum Op {
        Cpmr(u32),
        Aux(u32),
        Pll(PllRegister, u32),
        Volt(RailId, u32),
    }

    type Trace = Rc<RefCell<Vec<Op>>>;

    struct FakeRegisters {
        cpmr: u32,
        trace: Trace,
    }

    impl ClockRegisters for FakeRegisters {
        fn read_cpmr(&mut self) -> u32 {
            self.cpmr
        }

        fn write_cpmr(&mut self, value: u32) {
            self.cpmr = value;
            self.trace.borrow_mut().push(Op::Cpmr(value));
        }

        fn write_aux_clk_sel(&mut self, value: u32) {
            self.trace.borrow_mut().push(Op::Aux(value));
        }

        fn write_pll(&mut self, register: PllRegister, value: u32) {
            self.trace.borrow_mut().push(Op::Pll(register, value));
        }
    }

    struct FakeBackend {
        trace: Trace,
    }

    impl RailBackend for FakeBackend {
        fn set_voltage(&self, rail: RailId, uv: u32, _max_uv: u32) -> Result<(), BackendError> {
            self.trace.borrow_mut().push(Op::Volt(rail, uv));
            Ok(())
        }

        fn enable(&self, _rail: RailId) -> Result<(), BackendError> {
            Ok(())
        }
    }

    const PLL_A: RailId = RailId::Rpm { id: 8, voter: 1 };
    const PLL_B: RailId = RailId::Rpm { id: 23, voter: 1 };

    fn domain(cpmr: u32) -> (ClockDomain<FakeRegisters>, FakeBackend, Trace) {
        let trace = Trace::default();
        let rails = RailSet::new(&DomainRails {
            pll_a: Some(RailConfig::new("hfpll0_s8", PLL_A, 2_100_000)),
            pll_b: Some(RailConfig::new("hfpll0_l23", PLL_B, 1_800_000)),
            ..Default::default()
        });
        let domain = ClockDomain::new(
            FakeRegisters {
                cpmr,
                trace: trace.clone(),
            },
            rails,
        );
        (
            domain,
            FakeBackend {
                trace: trace.clone(),
            },
            trace,
        )
    }

    fn pll_on_ops() -> Vec<Op> {
        vec![
            Op::Pll(PllRegister::Mode, 0x2),
            Op::Pll(PllRegister::Mode, 0x6),
            Op::Pll(PllRegister::Mode, 0x7),
        ]
    }

    #[test]
    fn secondary_switch_holds_off_clock_gating() {
        let (mut domain, _, trace) = domain(0x0000_0101);
        domain.controller.set_secondary_source(SecondarySource::Aux);
        assert_eq!(
            *trace.borrow(),
            [Op::Cpmr(0x111), Op::Cpmr(0x119), Op::Cpmr(0x109)]
        );
    }

    #[test]
    fn primary_switch_preserves_other_fields() {
        let (mut domain, _, trace) = domain(0xF0F8);
        domain.controller.set_primary_source(PrimarySource::HfpllDiv2);
        assert_eq!(*trace.borrow(), [Op::Cpmr(0xF0FA)]);
        assert_eq!(domain.controller.primary_source(), PrimarySource::HfpllDiv2);
        assert_eq!(domain.controller.secondary_source(), SecondarySource::Aux);
    }

    #[test]
    fn hfpll_to_hfpll_parks_on_aux_and_skips_regulators() {
        let (mut domain, backend, trace) = domain(0);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);

        domain.switch_to(&CoreSpeed::hfpll(918_000, 0x22), SwitchMode::Full, &backend);

        let mut expected = vec![
            Op::Cpmr(0x10),
            Op::Cpmr(0x18),
            Op::Cpmr(0x08),
            Op::Cpmr(0x08),
            Op::Pll(PllRegister::Mode, 0),
            Op::Pll(PllRegister::LVal, 0x22),
        ];
        expected.extend(pll_on_ops());
        expected.push(Op::Cpmr(0x09));
        assert_eq!(*trace.borrow(), expected);
        assert_eq!(domain.current().khz, 918_000);
    }

    #[test]
    fn enabling_pll_votes_analog_rails_first() {
        let (mut domain, backend, trace) = domain(0x8);
        domain.current = CoreSpeed::shared_pll(384_000);

        domain.switch_to(&CoreSpeed::hfpll(702_000, 0x1A), SwitchMode::Full, &backend);

        let mut expected = vec![
            Op::Pll(PllRegister::LVal, 0x1A),
            Op::Volt(PLL_A, HFPLL_VDD_A_UV),
            Op::Volt(PLL_B, HFPLL_VDD_B_UV),
        ];
        expected.extend(pll_on_ops());
        expected.push(Op::Cpmr(0x9));
        assert_eq!(*trace.borrow(), expected);
        assert_eq!(domain.rails().current_uv(RailKind::PllB), Some(HFPLL_VDD_B_UV));
    }

    #[test]
    fn disabling_pll_deselects_it_first() {
        let (mut domain, backend, trace) = domain(0x1);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);
        domain.rails.set(&backend, RailKind::PllA, HFPLL_VDD_A_UV).unwrap();
        domain.rails.set(&backend, RailKind::PllB, HFPLL_VDD_B_UV).unwrap();
        trace.borrow_mut().clear();

        domain.switch_to(&CoreSpeed::shared_pll(384_000), SwitchMode::Full, &backend);

        assert_eq!(
            *trace.borrow(),
            [
                Op::Cpmr(0x11),
                Op::Cpmr(0x19),
                Op::Cpmr(0x09),
                Op::Cpmr(0x08),
                Op::Pll(PllRegister::Mode, 0),
                Op::Volt(PLL_B, 0),
                Op::Volt(PLL_A, 0),
            ]
        );
    }

    #[test]
    fn pll_only_leaves_muxes_alone() {
        let (mut domain, backend, trace) = domain(0x1);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);

        domain.switch_to(&CoreSpeed::STANDBY, SwitchMode::PllOnly, &backend);
        assert_eq!(*trace.borrow(), [Op::Pll(PllRegister::Mode, 0)]);
        assert_eq!(*domain.current(), CoreSpeed::STANDBY);
    }

    #[test]
    fn pll_only_reprograms_pll_without_touching_muxes() {
        let (mut domain, backend, trace) = domain(0x1);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);

        domain.switch_to(&CoreSpeed::hfpll(918_000, 0x22), SwitchMode::PllOnly, &backend);

        let mut expected = vec![
            Op::Pll(PllRegister::Mode, 0),
            Op::Pll(PllRegister::LVal, 0x22),
        ];
        expected.extend(pll_on_ops());
        assert_eq!(*trace.borrow(), expected);
        assert_eq!(domain.current().khz, 918_000);
    }

    #[test]
    fn skip_only_commits() {
        let (mut domain, backend, trace) = domain(0x1);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);

        domain.switch_to(&CoreSpeed::STANDBY, SwitchMode::Skip, &backend);
        assert!(trace.borrow().is_empty());
        assert_eq!(*domain.current(), CoreSpeed::STANDBY);
    }

    #[test]
    fn same_speed_is_a_no_op() {
        let (mut domain, backend, trace) = domain(0x1);
        domain.current = CoreSpeed::hfpll(702_000, 0x1A);

        domain.switch_to(&CoreSpeed::hfpll(702_000, 0x1A), SwitchMode::Full, &backend);
        assert!(trace.borrow().is_empty());
    }

    #[test]
    fn init_clock_sources_configures_pll_from_scratch() {
        let (mut domain, backend, trace) = domain(0xC0);
        domain.init_clock_sources(&CoreSpeed::hfpll(918_000, 0x22), &backend);

        let trace = trace.borrow();
        assert_eq!(trace[0], Op::Aux(AUX_CLK_SEL_PLL8));
        let configure = trace
            .iter()
            .position(|op| *op == Op::Pll(PllRegister::ConfigCtl, HFPLL_CONFIG_CTL))
            .unwrap();
        let disable = trace
            .iter()
            .position(|op| *op == Op::Pll(PllRegister::Mode, 0))
            .unwrap();
        assert!(disable < configure);
        assert!(trace.contains(&Op::Pll(PllRegister::DroopCtl, HFPLL_DROOP_CTL)));
        assert_eq!(trace.last(), Some(&Op::Cpmr(0x1)));
        drop(trace);
        assert_eq!(domain.current().khz, 918_000);
    }

    #[test]
    fn park_and_restore() {
        let (mut domain, _, trace) = domain(0x9);
        let parked = domain.park_on_standby();
        assert_eq!(
            parked,
            ParkedSelectors {
                primary: PrimarySource::Hfpll,
                secondary: SecondarySource::Aux,
            }
        );
        assert_eq!(domain.controller.regs.cpmr, 0x0);

        trace.borrow_mut().clear();
        domain.restore_selectors(parked);
        assert_eq!(domain.controller.regs.cpmr, 0x9);
    }
}
