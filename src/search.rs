use crate::{Address, Bus, BusError, Channels, Command};
use embedded_hal::delay::DelayNs;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum SearchState {
    #[default]
    Initialized,
    DeviceFound,
    End,
}

/// State carried between ROM search passes
#[derive(Clone, Default)]
pub struct DeviceSearch {
    address: Address,
    last_discrepancy: Option<u8>,
    state: SearchState,
}

impl DeviceSearch {
    pub fn new() -> DeviceSearch {
        DeviceSearch::default()
    }

    pub fn last_discrepancy(&self) -> Option<u8> {
        self.last_discrepancy
    }

    pub fn is_finished(&self) -> bool {
        self.state == SearchState::End
    }

    pub fn into_iter<'a, C: Channels, D: DelayNs>(
        self,
        bus: &'a mut Bus<C>,
        delay: &'a mut D,
    ) -> DeviceSearchIter<'a, C, D> {
        DeviceSearchIter {
            search: Some(self),
            bus,
            delay,
        }
    }
}

pub struct DeviceSearchIter<'a, C: Channels, D: DelayNs> {
    search: Option<DeviceSearch>,
    bus: &'a mut Bus<C>,
    delay: &'a mut D,
}

impl<C: Channels, D: DelayNs> Iterator for DeviceSearchIter<'_, C, D> {
    type Item = Result<Address, BusError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut search = self.search.take()?;
        let result = self.bus.search_next(&mut search, &mut *self.delay).transpose()?;
        self.search = Some(search);
        Some(result)
    }
}

enum Pass {
    Found(Address),
    Nothing,
}

impl<C: Channels> Bus<C> {
    /// Fills `addresses` with the devices on the bus, returning how many
    /// were found. A silent bus yields zero.
    pub fn search(
        &mut self,
        delay: &mut impl DelayNs,
        addresses: &mut [Address],
    ) -> Result<usize, BusError> {
        let mut search = DeviceSearch::new();
        let mut found = 0;
        while found < addresses.len() {
            match self.search_next(&mut search, delay)? {
                Some(address) => {
                    addresses[found] = address;
                    found += 1;
                }
                None => break,
            }
        }
        Ok(found)
    }

    /// Runs search passes until one yields an address with a valid CRC, or
    /// the tree is exhausted.
    pub fn search_next(
        &mut self,
        search: &mut DeviceSearch,
        delay: &mut impl DelayNs,
    ) -> Result<Option<Address>, BusError> {
        loop {
            match self.search_pass(search, delay)? {
                Pass::Found(address) if address.is_crc_valid() => return Ok(Some(address)),
                // corrupted branch, move on to the next one
                Pass::Found(_) => continue,
                Pass::Nothing => return Ok(None),
            }
        }
    }

    /// One walk down the ROM tree, see Maxim application note 187.
    fn search_pass(
        &mut self,
        search: &mut DeviceSearch,
        delay: &mut impl DelayNs,
    ) -> Result<Pass, BusError> {
        if SearchState::End == search.state {
            return Ok(Pass::Nothing);
        }

        if !self.reset(delay)? {
            search.state = SearchState::End;
            return Ok(Pass::Nothing);
        }

        self.write_command(Command::SearchRom)?;

        let mut last_zero = None;
        for i in 0..Address::BITS {
            let id_bit = self.read_bit(delay)?; // normal bit
            let cmp_bit = self.read_bit(delay)?; // complementary bit

            if id_bit && cmp_bit {
                // no device responded
                search.state = SearchState::End;
                return Ok(Pass::Nothing);
            }

            let direction = if id_bit != cmp_bit {
                id_bit
            } else {
                // devices disagree on this bit
                let direction = match search.last_discrepancy {
                    Some(last) if i < last => search.address.bit(i),
                    Some(last) if i == last => true,
                    _ => false,
                };
                if !direction {
                    last_zero = Some(i);
                }
                direction
            };

            search.address.write_bit(i, direction);
            self.write_bit(direction)?;
        }

        search.last_discrepancy = last_zero;
        search.state = if last_zero.is_none() {
            SearchState::End
        } else {
            SearchState::DeviceFound
        };
        Ok(Pass::Found(search.address))
    }
}
